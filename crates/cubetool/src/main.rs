mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use bytesize::ByteSize;
use clap::Parser;
use eyre_pretty::eyre::{Result, bail};
use lapis::disks::Console;
use lapis::disks::iso::Iso;
use lapis::disks::iso::filesystem::EntryKind;
use lapis::disks::wii;
use lapis::modules::disk::{DiskModule, IsoModule, ReadMode};

use crate::cli::Command;

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn info(path: &Path) -> Result<()> {
    let mut iso = Iso::new(open(path)?)?;
    let meta = iso.header().meta.clone();

    println!("name:            {}", meta.game_name);
    println!(
        "unique id:       {}",
        meta.unique_id().as_deref().unwrap_or("<invalid>")
    );
    println!("console:         {:?}", meta.console());
    println!("region:          {:?}", meta.region());
    println!("disk:            {} (version {})", meta.disk_id, meta.version);
    println!("audio streaming: {:?}", meta.audio_streaming());

    if meta.console() != Some(Console::GameCube) {
        tracing::info!("apploader is inside the encrypted data partition, skipping it");
        return Ok(());
    }

    let header = iso.apploader_header()?;
    println!(
        "apploader:       {} (entry 0x{:08X}, {})",
        header.date_str().unwrap_or("<unknown>"),
        header.entrypoint,
        ByteSize::b(header.size as u64)
    );

    if !header.is_valid() {
        tracing::warn!("apploader header is invalid, the disc won't boot");
    }

    Ok(())
}

fn files(path: &Path) -> Result<()> {
    let disk = IsoModule::new(open(path)?)?;
    let Some(fs) = disk.filesystem() else {
        bail!("disc has no readable filesystem table");
    };

    let mut total = 0;
    for entry in fs.entries() {
        match entry.kind {
            EntryKind::File { offset, length } => {
                total += length as u64;
                let size = ByteSize::b(length as u64).to_string();
                println!("0x{offset:09X} {size:>10} {}", entry.path);
            }
            EntryKind::Directory { .. } => println!("{:>22} {}/", "", entry.path),
        }
    }

    tracing::info!(
        "{} files, {} in total",
        fs.files().count(),
        ByteSize::b(total)
    );

    Ok(())
}

fn extract(path: &Path, file: &str, out: &Path) -> Result<()> {
    let mut disk = IsoModule::new(open(path)?)?;
    let kind = disk
        .filesystem()
        .and_then(|fs| fs.find(file))
        .map(|entry| entry.kind.clone());

    let (offset, length) = match kind {
        Some(EntryKind::File { offset, length }) => (offset, length),
        Some(EntryKind::Directory { .. }) => bail!("{file} is a directory"),
        None => bail!("no file at {file}"),
    };

    let mut data = vec![0; length as usize];
    disk.read(offset, &mut data, ReadMode::Raw)?;
    std::fs::write(out, &data)?;

    tracing::info!(
        "extracted {file} ({}) to {}",
        ByteSize::b(length as u64),
        out.display()
    );

    Ok(())
}

fn tmd(path: &Path) -> Result<()> {
    let mut iso = Iso::new(open(path)?)?;
    if iso.console() != Some(Console::Wii) {
        bail!("not a Wii disc");
    }

    let partitions = wii::partitions(iso.reader())?;
    let mut disk = IsoModule::new(open(path)?)?;
    for partition in partitions {
        let tmd = disk.tmd(partition.offset)?;
        let kind = format!("{:?}", partition.kind);
        println!(
            "0x{:09X} {kind:<10} TMD at 0x{:09X} ({})",
            partition.offset,
            tmd.offset,
            ByteSize::b(tmd.size as u64)
        );
    }

    Ok(())
}

fn setup_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or(EnvFilter::new("cubetool=info,lapis=info,disks=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    eyre_pretty::install()?;
    setup_tracing();
    let cfg = cli::Config::parse();

    match &cfg.command {
        Command::Info => info(&cfg.disc),
        Command::Files => files(&cfg.disc),
        Command::Extract { path, out } => extract(&cfg.disc, path, out),
        Command::Tmd => tmd(&cfg.disc),
    }
}
