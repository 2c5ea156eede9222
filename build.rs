use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const ENV_PREFIXES: &[&str] = &["ARCHIVER_", "PIM_"];

/// Prefixed literals in the source that are not configuration keys: the
/// stderr warning marker and the allowlist constant's own name. Keeping
/// them out means a stray variable with one of these names still gets
/// flagged by `check`.
const NON_CONFIG_KEYS: &[&str] = &["ARCHIVER_WARN", "ARCHIVER_ENV_ALLOWLIST"];

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
            out.push(path);
        }
    }
    Ok(())
}

fn is_env_key_char(byte: u8) -> bool {
    byte.is_ascii_uppercase() || byte.is_ascii_digit() || byte == b'_'
}

fn collect_env_keys(source: &str, prefix: &str, out: &mut BTreeSet<String>) {
    let bytes = source.as_bytes();
    let plen = prefix.len();
    let mut i = 0usize;
    while i + plen <= bytes.len() {
        if &bytes[i..i + plen] == prefix.as_bytes() {
            let mut j = i + plen;
            while j < bytes.len() && is_env_key_char(bytes[j]) {
                j += 1;
            }
            if j > i + plen {
                if let Some(raw) = source.get(i..j) {
                    out.insert(raw.to_string());
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }
}

fn write_generated_allowlist() -> std::io::Result<()> {
    let mut rs_files = Vec::new();
    collect_rs_files(Path::new("src"), &mut rs_files)?;

    let mut keys = BTreeSet::new();
    for file in rs_files {
        if let Ok(content) = fs::read_to_string(&file) {
            for prefix in ENV_PREFIXES {
                collect_env_keys(&content, prefix, &mut keys);
            }
        }
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let generated = Path::new(&out_dir).join("archiver_env_allowlist.rs");
    let mut f = fs::File::create(generated)?;
    writeln!(f, "pub const GENERATED_ARCHIVER_ENV_ALLOWLIST: &[&str] = &[")?;
    for key in keys {
        if NON_CONFIG_KEYS.contains(&key.as_str()) {
            continue;
        }
        writeln!(f, "    \"{key}\",")?;
    }
    writeln!(f, "];")?;
    Ok(())
}

fn main() {
    write_generated_allowlist().expect("failed to generate archiver env allowlist");

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap();

    // Unique-ish stamp surfaced via --version so operators can tell local builds apart.
    let build_id = format!("{:x}-{:x}", now.as_secs(), now.subsec_nanos());

    println!("cargo:rustc-env=BUILD_STAMP={}", build_id);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
