//! Inspect CRX3 browser extension packages.
//!
//! Bare zip archives are accepted too, in which case the package id is empty.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use crxfile::{CrxFile, CrxHeader, CrxOptions};
use log::LevelFilter;
use std::{fs, io::Cursor, path::PathBuf};

fn file_arg() -> Arg {
    Arg::new("file")
        .help("Path to a .crx package or zip archive")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn lang_arg() -> Arg {
    Arg::new("lang")
        .long("lang")
        .short('l')
        .help("Language used to resolve __MSG_<key>__ placeholders")
}

fn cli() -> Command {
    Command::new("crx_dump")
        .about("Inspect CRX3 browser extension packages")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v debug, -vv trace)"),
        )
        .subcommand(
            Command::new("id")
                .about("Print the package id")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("manifest")
                .about("Print the manifest as JSON")
                .arg(file_arg())
                .arg(lang_arg()),
        )
        .subcommand(
            Command::new("icons")
                .about("Write every declared icon to a directory")
                .arg(file_arg())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("message")
                .about("Resolve a __MSG_<key>__ placeholder")
                .arg(file_arg())
                .arg(Arg::new("raw").required(true))
                .arg(lang_arg()),
        )
        .subcommand(
            Command::new("entries")
                .about("List the archive entries")
                .arg(file_arg()),
        )
}

fn open(data: &[u8]) -> Result<CrxFile<Cursor<&[u8]>>> {
    let options = CrxOptions::new();
    let crx = if data.starts_with(&CrxHeader::MAGIC) {
        options.open_slice(data)?
    } else {
        options.open_zip_slice(data)?
    };

    Ok(crx)
}

/// Builds a single path component for an icon from untrusted manifest data.
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, so no separator survives.
fn icon_file_name(key: &str, name: &str) -> String {
    let sanitize = |x: &str| -> String {
        x.chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '_',
            })
            .collect()
    };

    format!("{}-{}", sanitize(key), sanitize(name))
}

fn read_file(matches: &ArgMatches) -> Result<Vec<u8>> {
    let path = matches
        .get_one::<PathBuf>("file")
        .context("missing file argument")?;
    fs::read(path).with_context(|| format!("unable to read {}", path.display()))
}

fn run(matches: &ArgMatches) -> Result<()> {
    let (name, sub) = matches.subcommand().context("missing subcommand")?;
    let data = read_file(sub)?;
    let crx = open(&data)?;
    let lang = sub
        .try_get_one::<String>("lang")
        .ok()
        .flatten()
        .map(|x| x.as_str());

    match name {
        "id" => println!("{}", crx.id()),
        "manifest" => {
            let manifest = crx.localized_manifest(lang);
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        "icons" => {
            let out = sub
                .get_one::<PathBuf>("out")
                .context("missing out argument")?;
            fs::create_dir_all(out)
                .with_context(|| format!("unable to create {}", out.display()))?;

            for (key, icon) in crx.icons()? {
                let path = out.join(icon_file_name(&key, icon.name()));
                fs::write(&path, icon.data())
                    .with_context(|| format!("unable to write {}", path.display()))?;
                println!("{}", path.display());
            }
        }
        "message" => {
            let raw = sub
                .get_one::<String>("raw")
                .context("missing raw argument")?;
            println!("{}", crx.message(lang, raw));
        }
        "entries" => {
            for entry in crx.archive().entries() {
                println!("{:>10} {}", entry.uncompressed_size_hint(), entry.path());
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    run(&matches)
}
