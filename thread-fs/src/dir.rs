//! # 目录层
//!
//! 单层平面目录：槽位下标即 inode 编号，槽内只存文件名。
//! 0 号槽永久保留给根目录项 `/`。
//!
//! 目录自身不做 I/O；它的字节形态作为 0 号 inode 文件的内容，
//! 由编排层在 `sync` 与挂载时读写。

use crate::block::{read_i32, write_i32};
use crate::NAME_CAP;

pub struct Directory {
    /// 下标 = inode 编号；`None` 即空闲槽
    names: Vec<Option<String>>,
}

impl Directory {
    pub fn new(total_inodes: usize) -> Self {
        assert!(total_inodes > 0);
        let mut names = vec![None; total_inodes];
        names[0] = Some("/".to_string());
        Self { names }
    }

    /// 文件名解析为 inode 编号
    pub fn namei(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|slot| slot.as_deref() == Some(name))
    }

    /// 为新文件分配一个槽位，返回其 inode 编号。
    /// 过长的文件名按 `NAME_CAP` 字节截断。根槽位不参与分配。
    pub fn ialloc(&mut self, name: &str) -> Option<usize> {
        let index = self
            .names
            .iter()
            .skip(1)
            .position(Option::is_none)
            .map(|i| i + 1)?;
        self.names[index] = Some(truncate_name(name));
        Some(index)
    }

    /// 释放一个槽位；本来就空闲时返回 `false`
    pub fn ifree(&mut self, inum: usize) -> bool {
        if inum == 0 || inum >= self.names.len() {
            return false;
        }
        self.names[inum].take().is_some()
    }

    /// 全部已分配槽位，按 inode 编号升序
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_deref().map(|name| (i, name)))
    }

    /// 编码为字节：先是全部槽位的名字长度（i32），再是定宽的名字槽
    pub fn encode(&self) -> Vec<u8> {
        let n = self.names.len();
        let mut data = vec![0u8; n * (4 + NAME_CAP)];
        for (i, slot) in self.names.iter().enumerate() {
            let name = slot.as_deref().unwrap_or("");
            write_i32(&mut data, 4 * i, name.len() as i32);
            data[4 * n + NAME_CAP * i..4 * n + NAME_CAP * i + name.len()]
                .copy_from_slice(name.as_bytes());
        }
        data
    }

    /// 从字节形态重建全部槽位。长度为 0 的槽是空闲槽。
    pub fn restore(&mut self, data: &[u8]) {
        let n = self.names.len();
        for i in 0..n {
            let len = read_i32(data, 4 * i).clamp(0, NAME_CAP as i32) as usize;
            self.names[i] = (len > 0).then(|| {
                let start = 4 * n + NAME_CAP * i;
                String::from_utf8_lossy(&data[start..start + len]).into_owned()
            });
        }
    }

    /// 编码后的总字节数
    pub fn encoded_len(&self) -> usize {
        self.names.len() * (4 + NAME_CAP)
    }
}

fn truncate_name(name: &str) -> String {
    let mut cap = NAME_CAP.min(name.len());
    while !name.is_char_boundary(cap) {
        cap -= 1;
    }
    name[..cap].to_string()
}
