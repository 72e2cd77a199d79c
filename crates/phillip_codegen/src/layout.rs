//! Member offsets under a [`Packing`] policy.
//!
//! Scalars align to their own size (largest power of two dividing it, capped
//! at 16); composites align to their strictest member; sizes round up to the
//! alignment. The same offsets feed the ArrayLib record and the FFI shape.

use crate::composite::Packing;

const MAX_ALIGN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub offsets: Vec<usize>,
    pub size: usize,
    pub align: usize,
}

/// Size and alignment of one member element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLayout {
    pub size: usize,
    pub align: usize,
    pub count: usize,
}

pub fn scalar_align(size: usize) -> usize {
    if size == 0 {
        return 1;
    }
    (1usize << size.trailing_zeros()).min(MAX_ALIGN)
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

pub fn compute_layout(members: &[MemberLayout], packing: Packing) -> Layout {
    let cap = match packing {
        Packing::Natural => MAX_ALIGN,
        Packing::Packed(n) => (n as usize).clamp(1, MAX_ALIGN),
    };

    let mut offsets = Vec::with_capacity(members.len());
    let mut offset = 0;
    let mut align = 1;

    for member in members {
        let member_align = member.align.clamp(1, cap);
        offset = round_up(offset, member_align);
        offsets.push(offset);
        offset += member.size * member.count;
        align = align.max(member_align);
    }

    Layout {
        offsets,
        size: round_up(offset, align),
        align,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(size: usize) -> MemberLayout {
        MemberLayout {
            size,
            align: scalar_align(size),
            count: 1,
        }
    }

    #[test]
    fn test_natural_layout_pads() {
        let layout = compute_layout(&[scalar(1), scalar(4), scalar(2)], Packing::Natural);
        assert_eq!(layout.offsets, vec![0, 4, 8]);
        assert_eq!(layout.size, 12);
        assert_eq!(layout.align, 4);
    }

    #[test]
    fn test_packed_layout_has_no_padding() {
        let layout = compute_layout(&[scalar(1), scalar(8)], Packing::Packed(1));
        assert_eq!(layout.offsets, vec![0, 1]);
        assert_eq!(layout.size, 9);
        assert_eq!(layout.align, 1);
    }

    #[test]
    fn test_packing_caps_member_alignment() {
        let members = [scalar(1), scalar(4), scalar(8)];

        let two = compute_layout(&members, Packing::Packed(2));
        assert_eq!(two.offsets, vec![0, 2, 6]);
        assert_eq!((two.size, two.align), (14, 2));

        let four = compute_layout(&members, Packing::Packed(4));
        assert_eq!(four.offsets, vec![0, 4, 8]);
        assert_eq!((four.size, four.align), (16, 4));

        let sixteen = compute_layout(&members, Packing::Packed(16));
        assert_eq!(sixteen, compute_layout(&members, Packing::Natural));
    }

    #[test]
    fn test_arrays_and_odd_sizes() {
        let array = MemberLayout {
            count: 3,
            ..scalar(4)
        };
        let layout = compute_layout(&[scalar(1), array], Packing::Natural);
        assert_eq!(layout.offsets, vec![0, 4]);
        assert_eq!(layout.size, 16);

        assert_eq!(scalar_align(12), 4);
        assert_eq!(scalar_align(16), 16);
        assert_eq!(scalar_align(32), 16);
    }

    #[test]
    fn test_empty_composite() {
        let layout = compute_layout(&[], Packing::Natural);
        assert_eq!(layout.size, 0);
        assert_eq!(layout.align, 1);
    }
}
