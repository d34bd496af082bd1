mod block_file;
mod cli;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use thread_fs::{FileSystem, OpenMode, BLOCK_SIZE};

use self::block_file::BlockFile;
use self::cli::{Cli, Command};

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let command = match cli.command {
        Command::Format { size, inodes } => {
            return format_volume(&cli.image, size.0 as usize / BLOCK_SIZE, inodes);
        }
        command => command,
    };

    let fd = OpenOptions::new().read(true).write(true).open(&cli.image)?;
    let total_blocks = fd.metadata()?.len() as usize / BLOCK_SIZE;
    let dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let fs = FileSystem::new(dev, total_blocks).unwrap();

    match command {
        Command::Format { .. } => unreachable!(),
        Command::Push { source, name } => {
            let name = name.unwrap_or_else(|| {
                source
                    .file_name()
                    .expect("source has no file name")
                    .to_string_lossy()
                    .into_owned()
            });

            let mut data = Vec::new();
            File::open(&source)?.read_to_end(&mut data)?;

            let handle = fs.open(&name, OpenMode::Write).unwrap();
            fs.write(&handle, &data).unwrap();
            fs.close(&handle).unwrap();
            fs.sync().unwrap();
            log::info!("pushed {:?} as {:?} ({} bytes)", source, name, data.len());
        }
        Command::Cat { name } => {
            let handle = fs.open(&name, OpenMode::Read).unwrap();
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let mut buf = [0u8; BLOCK_SIZE];
            loop {
                let n = fs.read(&handle, &mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])?;
            }
            fs.close(&handle).unwrap();
        }
        Command::Ls => {
            for (inum, name, size) in fs.list().unwrap() {
                println!("{inum:>4} {size:>8}  {name}");
            }
        }
        Command::Rm { name } => {
            fs.delete(&name).unwrap();
            fs.sync().unwrap();
        }
    }

    Ok(())
}

fn format_volume(image: &Path, total_blocks: usize, inodes: usize) -> io::Result<()> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(image)?;
    fd.set_len((total_blocks * BLOCK_SIZE) as u64)?;

    let dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let fs = FileSystem::new(dev, total_blocks).unwrap();
    fs.format(inodes).unwrap();
    fs.sync().unwrap();
    log::info!("formatted {:?}: {} blocks, {} inodes", image, total_blocks, inodes);
    Ok(())
}
