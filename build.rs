//! Build script for proto compilation.
//!
//! The security token service bindings in `src/generated.rs` are committed to
//! the repository, so this only needs to run when `proto/sts.proto` changes.
//!
//! To regenerate: `cargo build --features regenerate-proto`

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src");
        tonic_prost_build::configure()
            .build_server(false)
            .out_dir(&out_dir)
            .compile_protos(&["proto/sts.proto"], &["proto"])?;

        let generated = out_dir.join("chainguard.platform.oidc.rs");
        let target = out_dir.join("generated.rs");
        if generated.exists() {
            std::fs::rename(generated, target)?;
        }
    }

    println!("cargo:rerun-if-changed=proto/sts.proto");

    Ok(())
}
