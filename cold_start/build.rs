use clap::CommandFactory;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let version: &'static str = Box::leak(env::var("CARGO_PKG_VERSION")?.into_boxed_str());

    // OUT_DIR is target/<profile>/build/<pkg>-<hash>/out
    let workspace_root = out_dir.join("../../../../../");
    let man_dir = workspace_root.join("man").join("man1");
    let docs_dir = workspace_root.join("docs");
    fs::create_dir_all(&man_dir)?;
    fs::create_dir_all(&docs_dir)?;

    let cmd = cold_start_cli_types::Cli::command().version(version);

    let mut buffer: Vec<u8> = Default::default();
    clap_mangen::Man::new(cmd.clone()).render(&mut buffer)?;
    fs::write(man_dir.join("cold-start.1"), &buffer)?;

    for subcmd in cmd.get_subcommands() {
        let mut buffer: Vec<u8> = Default::default();
        clap_mangen::Man::new(subcmd.clone()).render(&mut buffer)?;
        let subcmd_name = subcmd.get_name();
        fs::write(man_dir.join(format!("cold-start-{subcmd_name}.1")), &buffer)?;
    }

    let markdown = clap_markdown::help_markdown::<cold_start_cli_types::Cli>();
    fs::write(docs_dir.join("manpage.md"), markdown)?;

    println!("cargo:rerun-if-changed=../cli_types/src/lib.rs");

    Ok(())
}
