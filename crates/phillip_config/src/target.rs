//! Host platform description used to drive the native toolchain
//!
//! Generated code is always built for the machine that loads it, so the
//! triple here only steers driver selection, artifact naming and PIC flags.

use std::env::consts;
use std::str::FromStr;

/// Target architecture/OS configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTriple {
    /// Architecture (e.g., x86_64, aarch64)
    pub arch: String,
    /// Vendor (e.g., unknown, apple, pc)
    pub vendor: String,
    /// Operating system (e.g., linux, darwin, windows)
    pub os: String,
    /// ABI/environment (e.g., gnu, msvc, musl)
    pub env: Option<String>,
}

impl TargetTriple {
    pub fn new(
        arch: impl Into<String>,
        vendor: impl Into<String>,
        os: impl Into<String>,
        env: Option<impl Into<String>>,
    ) -> Self {
        Self {
            arch: arch.into(),
            vendor: vendor.into(),
            os: os.into(),
            env: env.map(|e| e.into()),
        }
    }

    /// Describe the machine this process is running on.
    pub fn host() -> Self {
        let os = match consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let vendor = match os {
            "darwin" => "apple",
            "windows" => "pc",
            _ => "unknown",
        };
        let env = if cfg!(target_env = "msvc") {
            Some("msvc")
        } else if cfg!(target_env = "musl") {
            Some("musl")
        } else if cfg!(target_env = "gnu") {
            Some("gnu")
        } else {
            None
        };

        Self::new(consts::ARCH, vendor, os, env)
    }

    /// Parse a target triple string (e.g., "x86_64-unknown-linux-gnu")
    pub fn parse(triple: &str) -> Result<Self, String> {
        let parts: Vec<&str> = triple.split('-').collect();

        if parts.len() < 3 {
            return Err(format!("Invalid target triple format: {}", triple));
        }

        let mut arch = parts[0].to_string();
        if arch == "arm64" {
            arch = "aarch64".to_string();
        }

        // Strip version suffixes such as darwin23.1.0
        let raw_os = parts[2];
        let os_end = raw_os
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
            .map_or(raw_os.len(), |(idx, _)| idx);
        let os = if os_end == 0 {
            raw_os.to_string()
        } else {
            raw_os[..os_end].to_string()
        };

        let env = if parts.len() > 3 {
            let env_str = parts[3..].join("-");
            if env_str.is_empty() {
                None
            } else {
                Some(env_str)
            }
        } else {
            None
        };

        Ok(Self {
            arch,
            vendor: parts[1].to_string(),
            os,
            env,
        })
    }

    pub fn to_triple_string(&self) -> String {
        match &self.env {
            Some(env) => format!("{}-{}-{}-{}", self.arch, self.vendor, self.os, env),
            None => format!("{}-{}-{}", self.arch, self.vendor, self.os),
        }
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_darwin(&self) -> bool {
        self.os == "darwin"
    }

    pub fn is_unix(&self) -> bool {
        matches!(
            self.os.as_str(),
            "linux" | "darwin" | "freebsd" | "openbsd" | "netbsd"
        )
    }

    /// Get the C++ compiler driver for this target
    pub fn cxx_compiler(&self) -> String {
        if self.is_windows() {
            // clang++ keeps accepting the POSIX-style flags used everywhere else
            "clang++".to_string()
        } else {
            "c++".to_string()
        }
    }

    pub fn shared_library_extension(&self) -> &'static str {
        if self.is_windows() {
            "dll"
        } else if self.is_darwin() {
            "dylib"
        } else {
            "so"
        }
    }

    pub fn executable_extension(&self) -> &'static str {
        if self.is_windows() { "exe" } else { "" }
    }

    /// File name of a shared library called `stem` on this target
    pub fn shared_library_name(&self, stem: &str) -> String {
        if self.is_windows() {
            format!("{stem}.dll")
        } else {
            format!("lib{stem}.{}", self.shared_library_extension())
        }
    }

    /// Flags turning a translation unit into a loadable shared library
    pub fn shared_library_flags(&self) -> Vec<String> {
        let mut flags = vec!["-shared".to_string()];

        if self.needs_pic() {
            flags.push("-fPIC".to_string());
        }

        if self.is_darwin() {
            flags.push("-undefined".to_string());
            flags.push("dynamic_lookup".to_string());
        }

        flags
    }

    /// Linker flags exporting `symbol` from a shared library
    pub fn export_flags(&self, symbol: &str) -> Vec<String> {
        if self.is_windows() {
            vec![format!("-Wl,/EXPORT:{symbol}")]
        } else {
            Vec::new()
        }
    }

    pub fn needs_pic(&self) -> bool {
        matches!(self.os.as_str(), "linux" | "freebsd" | "openbsd" | "netbsd")
    }
}

impl FromStr for TargetTriple {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for TargetTriple {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_triple() {
        let triple = TargetTriple::parse("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(triple.arch, "x86_64");
        assert_eq!(triple.vendor, "unknown");
        assert_eq!(triple.os, "linux");
        assert_eq!(triple.env, Some("gnu".to_string()));
        assert!(triple.needs_pic());
        assert_eq!(triple.shared_library_name("probe"), "libprobe.so");
    }

    #[test]
    fn test_darwin_version_suffix() {
        let triple = TargetTriple::parse("arm64-apple-darwin23.1.0").unwrap();
        assert_eq!(triple.arch, "aarch64");
        assert_eq!(triple.os, "darwin");
        assert_eq!(triple.shared_library_extension(), "dylib");
        assert!(triple.export_flags("foo").is_empty());
    }

    #[test]
    fn test_windows_exports() {
        let triple = TargetTriple::parse("x86_64-pc-windows-msvc").unwrap();
        assert_eq!(triple.cxx_compiler(), "clang++");
        assert_eq!(triple.shared_library_name("module"), "module.dll");
        assert_eq!(triple.export_flags("foo"), vec!["-Wl,/EXPORT:foo".to_string()]);
    }

    #[test]
    fn test_rejects_short_triple() {
        assert!(TargetTriple::parse("x86_64-linux").is_err());
    }
}
