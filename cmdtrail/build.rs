use std::{env, fs, fs::File, io::Write, path::Path};

use libbpf_cargo::SkeletonBuilder;

const READLINE_SOURCE: &str = "src/core/probe/user/bpf/readline.bpf.c";

// Not super fail safe (not using Path).
fn get_paths(fpath: &str) -> (String, String) {
    let (dir, file) = fpath.rsplit_once('/').unwrap();
    let split: Vec<_> = file.split_terminator('.').collect();

    if let Some(basename) = split.first() {
        (dir.to_string(), basename.to_string())
    } else {
        panic!("Failed to find base name for {}", fpath);
    }
}

fn target_arch() -> &'static str {
    match env::var("CARGO_CFG_TARGET_ARCH").as_deref() {
        Ok("aarch64") => "arm64",
        Ok("powerpc64") => "powerpc",
        Ok("s390x") => "s390",
        Ok("riscv64") => "riscv",
        _ => "x86",
    }
}

// Compiles a BPF program into an object and embeds it as a byte array. The
// resulting file exposes `DATA`, loaded at runtime with libbpf. If the object
// can't be built (e.g. no clang around) an empty object is embedded so the
// rest of the crate still builds; loading it will fail at runtime.
fn gen_embedded_obj(source: &str) {
    let (_, base) = get_paths(source);
    let out_dir = env::var("OUT_DIR").unwrap();
    let obj = format!("{out_dir}/{base}.bpf.o");

    let multiarch = format!(
        "-I/usr/include/{}-linux-gnu",
        env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "x86_64".to_string())
    );
    let data = match SkeletonBuilder::new()
        .source(source)
        .obj(&obj)
        .clang_args([
            format!("-D__TARGET_ARCH_{}", target_arch()),
            multiarch,
            "-Wall".to_string(),
        ])
        .build()
    {
        Ok(_) => fs::read(&obj).unwrap_or_else(|e| panic!("Could not read {obj}: {e}")),
        Err(e) => {
            println!("cargo:warning=Could not build {source}, probes won't load: {e}");
            Vec::new()
        }
    };

    let mut rs = File::create(Path::new(&out_dir).join(format!("{base}.rs"))).unwrap();
    write!(
        rs,
        r#"
           pub(crate) const DATA: &[u8] = &{data:?};
           "#
    )
    .unwrap();

    println!("cargo:rerun-if-changed={source}");
}

fn main() {
    // core::probe::user
    gen_embedded_obj(READLINE_SOURCE);
}
