use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::{BlockDevice, DeviceError};
use thread_fs::BLOCK_SIZE;

/// 宿主机文件模拟的块设备：镜像文件按 512 字节一块线性排布
#[derive(Debug)]
pub struct BlockFile(Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }

    fn seek_to(file: &mut File, block_id: usize) -> Result<(), DeviceError> {
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map(|_| ())
            .map_err(|_| DeviceError::Io)
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let mut file = self.0.lock().unwrap();
        Self::seek_to(&mut file, block_id)?;
        file.read_exact(buf).map_err(|_| DeviceError::Io)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let mut file = self.0.lock().unwrap();
        Self::seek_to(&mut file, block_id)?;
        file.write_all(buf).map_err(|_| DeviceError::Io)
    }

    fn sync(&self) -> Result<(), DeviceError> {
        self.0.lock().unwrap().sync_all().map_err(|_| DeviceError::Io)
    }
}
