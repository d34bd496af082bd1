//! # thread-fs
//!
//! 单卷、inode 式的教学文件系统，构建在裸块设备之上。
//!
//! 整体架构，自上而下：

// 编排层：open/read/write/seek/close/delete/format/sync
mod fs;
pub use fs::FileSystem;

// 打开文件表：按 inode 仲裁并发访问，不可立即授予时挂起调用者
mod file_table;
pub use file_table::{FileHandle, FileTable, OpenMode, Whence};

// 目录层：文件名 → inode 编号的平面映射
mod dir;
pub use dir::Directory;

// 磁盘数据结构层：inode 记录与其块映射
mod inode;
pub use inode::{AccessFlag, Inode};

// 超级块层：卷头与空闲块链表分配器
mod super_block;
pub use super_block::SuperBlock;

// 块缓存层：定长缓冲池，二次机会淘汰，写回式
mod cache;
pub use cache::BlockCache;

// 块编号
mod block;
pub use block::BlockId;

mod error;
pub use error::{FsError, Result};

pub const BLOCK_SIZE: usize = 512;
/// inode 记录的直接块编号个数
pub const DIRECT_COUNT: usize = 11;
/// 一条 inode 记录在磁盘上的字节数
pub const INODE_SIZE: usize = 32;
/// 目录项文件名的最大字节数
pub const NAME_CAP: usize = 30;
/// 卷头校验失败时重新格式化所用的 inode 数
pub const DEFAULT_INODES: usize = 64;
/// 块缓存个数的上限
pub const CACHE_CAPACITY: usize = 16;

type DataBlock = [u8; BLOCK_SIZE];
