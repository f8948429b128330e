//! Assembles the labeled preimage document that the build id is hashed from.
//!
//! Section order and marker text are part of the fingerprint: changing either
//! changes every build id and invalidates every cache keyed on it.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use crate::buildid::config::ToolchainConfig;
use crate::buildid::probe::ProbeRunner;
use crate::env_loader::os_bytes;

#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

pub const LLD_COMMAND: &str = "ld.lld";
pub const MOLD_COMMAND: &str = "mold";

const DOCUMENT_LABEL: &str = "build-id";

const VERSION_ARGS: &[&str] = &["--version"];
/// Compiler banner: `-v` also prints the configure line and, for GCC, the
/// LTO wrapper path.
const BANNER_ARGS: &[&str] = &["-v"];
const C_VERBOSE_ARGS: &[&str] = &["-x", "c", "-E", "-v", NULL_DEVICE, "-o", NULL_DEVICE];
const OBJC_VERBOSE_ARGS: &[&str] = &[
    "-x",
    "objective-c",
    "-E",
    "-v",
    NULL_DEVICE,
    "-o",
    NULL_DEVICE,
];
const CXX_VERBOSE_ARGS: &[&str] = &["-x", "c++", "-E", "-v", NULL_DEVICE, "-o", NULL_DEVICE];
const OBJCXX_VERBOSE_ARGS: &[&str] = &[
    "-x",
    "objective-c++",
    "-E",
    "-v",
    NULL_DEVICE,
    "-o",
    NULL_DEVICE,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Line(String),
    Assign {
        name: String,
        value: OsString,
    },
    Probe {
        command: OsString,
        args: &'static [&'static str],
    },
}

impl Entry {
    fn assign(name: &str, value: &OsStr) -> Self {
        Self::Assign {
            name: name.to_string(),
            value: value.to_os_string(),
        }
    }

    fn probe(command: &OsStr, args: &'static [&'static str]) -> Self {
        Self::Probe {
            command: command.to_os_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: &'static str,
    pub entries: Vec<Entry>,
}

fn compiler_section(
    label: &'static str,
    command: &OsStr,
    verbose_args: &'static [&'static str],
    objc_args: &'static [&'static str],
    standard_name: &str,
    standard: &OsStr,
) -> Section {
    Section {
        label,
        entries: vec![
            Entry::probe(command, BANNER_ARGS),
            Entry::probe(command, verbose_args),
            Entry::probe(command, objc_args),
            Entry::assign(standard_name, standard),
        ],
    }
}

fn binutil_section(
    label: &'static str,
    command: &OsStr,
    extra: &BTreeMap<String, OsString>,
) -> Section {
    let mut entries = vec![Entry::probe(command, VERSION_ARGS)];
    entries.extend(extra.iter().map(|(name, value)| Entry::assign(name, value)));
    Section { label, entries }
}

/// Lay out every section without running anything.
pub fn plan(config: &ToolchainConfig, salt: &[String]) -> Vec<Section> {
    vec![
        Section {
            label: "salt",
            entries: vec![Entry::Line(salt.join(" "))],
        },
        Section {
            label: "flags",
            entries: vec![
                Entry::assign("CPPFLAGS", &config.cppflags),
                Entry::assign("CFLAGS", &config.cflags),
                Entry::assign("CXXFLAGS", &config.cxxflags),
                Entry::assign("LDFLAGS", &config.ldflags),
            ],
        },
        compiler_section(
            "cc",
            &config.cc,
            C_VERBOSE_ARGS,
            OBJC_VERBOSE_ARGS,
            "C_STANDARD",
            &config.c_standard,
        ),
        compiler_section(
            "cxx",
            &config.cxx,
            CXX_VERBOSE_ARGS,
            OBJCXX_VERBOSE_ARGS,
            "CXX_STANDARD",
            &config.cxx_standard,
        ),
        Section {
            label: "lld",
            entries: vec![Entry::probe(OsStr::new(LLD_COMMAND), VERSION_ARGS)],
        },
        Section {
            label: "mold",
            entries: vec![Entry::probe(OsStr::new(MOLD_COMMAND), VERSION_ARGS)],
        },
        binutil_section("ar", &config.ar, &config.ar_vars),
        binutil_section("nm", &config.nm, &config.nm_vars),
        binutil_section("ranlib", &config.ranlib, &config.ranlib_vars),
        binutil_section("strip", &config.strip, &config.strip_vars),
        Section {
            label: "lto",
            entries: vec![Entry::assign("LTO", &config.lto)],
        },
    ]
}

fn push_line(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
}

/// Run the probes strictly in order and concatenate everything into one
/// byte stream. Probe output is appended verbatim.
pub fn render(sections: &[Section], runner: &dyn ProbeRunner) -> Vec<u8> {
    let mut out = Vec::new();
    push_line(&mut out, &format!("=== begin {DOCUMENT_LABEL} ==="));
    for section in sections {
        push_line(&mut out, &format!("--- begin {} ---", section.label));
        for entry in &section.entries {
            match entry {
                Entry::Line(text) => push_line(&mut out, text),
                Entry::Assign { name, value } => {
                    out.extend_from_slice(name.as_bytes());
                    out.push(b'=');
                    out.extend_from_slice(os_bytes(value));
                    out.push(b'\n');
                }
                Entry::Probe { command, args } => out.extend(runner.run(command, args)),
            }
        }
        push_line(&mut out, &format!("--- end {} ---", section.label));
    }
    push_line(&mut out, &format!("=== end {DOCUMENT_LABEL} ==="));
    out
}

pub fn build_preimage(
    config: &ToolchainConfig,
    salt: &[String],
    runner: &dyn ProbeRunner,
) -> Vec<u8> {
    render(&plan(config, salt), runner)
}

#[cfg(test)]
mod tests {
    use super::{LLD_COMMAND, MOLD_COMMAND, NULL_DEVICE, build_preimage, plan};
    use crate::buildid::config::ToolchainConfig;
    use crate::buildid::probe::ProbeRunner;
    use std::cell::RefCell;
    use std::ffi::OsStr;

    #[derive(Default)]
    struct FakeRunner {
        calls: RefCell<Vec<String>>,
    }

    impl ProbeRunner for FakeRunner {
        fn run(&self, command: &OsStr, args: &[&str]) -> Vec<u8> {
            let call = format!("{} {}", command.to_string_lossy(), args.join(" "));
            self.calls.borrow_mut().push(call.clone());
            format!("<{call}>\n").into_bytes()
        }
    }

    struct FailingRunner;

    impl ProbeRunner for FailingRunner {
        fn run(&self, command: &OsStr, _args: &[&str]) -> Vec<u8> {
            format!("sh: {}: not found\n", command.to_string_lossy()).into_bytes()
        }
    }

    fn sample_config() -> ToolchainConfig {
        let mut cfg = ToolchainConfig {
            cc: "gcc".into(),
            cxx: "g++".into(),
            c_standard: "c11".into(),
            cflags: "-O2".into(),
            ar: "ar".into(),
            lto: "thin".into(),
            ..ToolchainConfig::default()
        };
        cfg.ar_vars.insert("AR_Z".to_string(), "z".into());
        cfg.ar_vars.insert("AR_A".to_string(), "a".into());
        cfg
    }

    #[test]
    fn probes_run_in_fixed_order() {
        let runner = FakeRunner::default();
        build_preimage(&sample_config(), &[], &runner);

        let calls = runner.calls.into_inner();
        let null = NULL_DEVICE;
        assert_eq!(
            calls,
            vec![
                "gcc -v".to_string(),
                format!("gcc -x c -E -v {null} -o {null}"),
                format!("gcc -x objective-c -E -v {null} -o {null}"),
                "g++ -v".to_string(),
                format!("g++ -x c++ -E -v {null} -o {null}"),
                format!("g++ -x objective-c++ -E -v {null} -o {null}"),
                format!("{LLD_COMMAND} --version"),
                format!("{MOLD_COMMAND} --version"),
                "ar --version".to_string(),
                " --version".to_string(),
                " --version".to_string(),
                " --version".to_string(),
            ]
        );
    }

    #[test]
    fn document_layout_is_exact() {
        let doc = build_preimage(
            &sample_config(),
            &["my-salt".to_string(), "extra".to_string()],
            &FailingRunner,
        );
        let text = String::from_utf8(doc).expect("utf8");
        let expected = [
            "=== begin build-id ===",
            "--- begin salt ---",
            "my-salt extra",
            "--- end salt ---",
            "--- begin flags ---",
            "CPPFLAGS=",
            "CFLAGS=-O2",
            "CXXFLAGS=",
            "LDFLAGS=",
            "--- end flags ---",
            "--- begin cc ---",
            "sh: gcc: not found",
            "sh: gcc: not found",
            "sh: gcc: not found",
            "C_STANDARD=c11",
            "--- end cc ---",
            "--- begin cxx ---",
            "sh: g++: not found",
            "sh: g++: not found",
            "sh: g++: not found",
            "CXX_STANDARD=",
            "--- end cxx ---",
            "--- begin lld ---",
            "sh: ld.lld: not found",
            "--- end lld ---",
            "--- begin mold ---",
            "sh: mold: not found",
            "--- end mold ---",
            "--- begin ar ---",
            "sh: ar: not found",
            "AR_A=a",
            "AR_Z=z",
            "--- end ar ---",
            "--- begin nm ---",
            "sh: : not found",
            "--- end nm ---",
            "--- begin ranlib ---",
            "sh: : not found",
            "--- end ranlib ---",
            "--- begin strip ---",
            "sh: : not found",
            "--- end strip ---",
            "--- begin lto ---",
            "LTO=thin",
            "--- end lto ---",
            "=== end build-id ===",
        ]
        .join("\n")
            + "\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_salt_keeps_an_empty_line() {
        let doc = build_preimage(&ToolchainConfig::default(), &[], &FailingRunner);
        let text = String::from_utf8(doc).expect("utf8");
        assert!(text.contains("--- begin salt ---\n\n--- end salt ---\n"));
    }

    #[test]
    fn probe_output_without_newline_is_kept_verbatim() {
        struct Bare;
        impl ProbeRunner for Bare {
            fn run(&self, _command: &OsStr, _args: &[&str]) -> Vec<u8> {
                vec![0xff, b'x']
            }
        }
        let doc = build_preimage(&ToolchainConfig::default(), &[], &Bare);
        let needle = b"--- begin lld ---\n\xffx--- end lld ---\n";
        assert!(doc.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn every_input_changes_the_document() {
        let base = build_preimage(&sample_config(), &["s".to_string()], &FailingRunner);
        let variants: [fn(&mut ToolchainConfig); 7] = [
            |c| c.cppflags = "-DX".into(),
            |c| c.cflags = "-O3".into(),
            |c| c.cxxflags = "-O3".into(),
            |c| c.ldflags = "-fuse-ld=lld".into(),
            |c| c.cxx_standard = "c++20".into(),
            |c| c.lto = "full".into(),
            |c| {
                c.strip_vars.insert("STRIP_FLAGS".to_string(), "-g".into());
            },
        ];
        for mutate in variants {
            let mut cfg = sample_config();
            mutate(&mut cfg);
            let doc = build_preimage(&cfg, &["s".to_string()], &FailingRunner);
            assert_ne!(doc, base);
        }

        let salted = build_preimage(&sample_config(), &["t".to_string()], &FailingRunner);
        assert_ne!(salted, base);
    }

    #[cfg(unix)]
    #[test]
    fn invalid_utf8_flags_are_hashed_as_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;
        let with_flags = |bytes: &[u8]| {
            let mut cfg = sample_config();
            cfg.cflags = OsStr::from_bytes(bytes).to_os_string();
            build_preimage(&cfg, &[], &FailingRunner)
        };
        let first = with_flags(b"-O2 \xff");
        let second = with_flags(b"-O2 \xfe");
        assert_ne!(first, second);
        let needle = b"\nCFLAGS=-O2 \xff\n";
        assert!(first.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn plan_has_every_section_once() {
        let labels: Vec<_> = plan(&ToolchainConfig::default(), &[])
            .iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "salt", "flags", "cc", "cxx", "lld", "mold", "ar", "nm", "ranlib", "strip", "lto"
            ]
        );
    }
}
