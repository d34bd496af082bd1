//! # 块设备接口层
//!
//! 块设备以**块**为单位存储数据；[`BlockDevice`] 是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过本契约访问底层设备：同步读、同步写、落盘。
//! 设备不保证部分写入的原子性，上层也不对其建模。

use std::sync::Mutex;

/// 设备层错误。读写失败对当次操作而言不可恢复，由调用者决定善后。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 块编号超出设备容量
    OutOfRange,
    /// 底层介质读写失败
    Io,
}

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// 把设备侧尚未落盘的数据推到持久介质
    fn sync(&self) -> Result<(), DeviceError>;
}

/// 内存盘：一段连续内存模拟的块设备，测试与打包工具使用
#[derive(Debug)]
pub struct MemDisk {
    data: Mutex<Vec<u8>>,
    block_size: usize,
}

impl MemDisk {
    pub fn new(total_blocks: usize, block_size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; total_blocks * block_size]),
            block_size,
        }
    }

    fn range(&self, block_id: usize, len: usize) -> Result<std::ops::Range<usize>, DeviceError> {
        let start = block_id * self.block_size;
        let end = start + len;
        if len > self.block_size || end > self.data.lock().unwrap().len() {
            return Err(DeviceError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.range(block_id, buf.len())?;
        buf.copy_from_slice(&self.data.lock().unwrap()[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let range = self.range(block_id, buf.len())?;
        self.data.lock().unwrap()[range].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}
