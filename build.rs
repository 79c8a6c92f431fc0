// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("artefact-downloader")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Artefact Downloader Contributors")
        .about("Automates the downloading of installer files and images")
        .arg(
            Arg::new("config_path")
                .required(true)
                .value_name("CONFIG_PATH")
                .help("Location of the configuration file"),
        )
        .arg(
            Arg::new("dryrun")
                .short('d')
                .long("dryrun")
                .alias("dry-run")
                .action(ArgAction::SetTrue)
                .help("Resolve and check every source without downloading anything"),
        )
        .arg(
            Arg::new("state_file")
                .long("state-file")
                .value_name("PATH")
                .help("Run-state file (overrides stateFile from the configuration)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("artefact-downloader.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
