use thread_fs::{Directory, Inode, BLOCK_SIZE, INODE_SIZE, NAME_CAP};

#[test]
fn layout() {
    assert_eq!(0, BLOCK_SIZE % INODE_SIZE);

    // 空 inode 记录编码出 32 字节，且往返后不变
    let mut buf = [0u8; INODE_SIZE];
    let inode = Inode::default();
    inode.encode(&mut buf);
    let back = Inode::decode(&buf);
    assert_eq!(0, back.length);
    assert_eq!(0, back.count);
    assert_eq!(inode.flag, back.flag);
}

#[test]
fn directory_encoding() {
    let mut dir = Directory::new(8);
    assert_eq!(8 * (4 + NAME_CAP), dir.encoded_len());

    let a = dir.ialloc("alpha").unwrap();
    let b = dir.ialloc("beta").unwrap();
    let data = dir.encode();
    assert_eq!(dir.encoded_len(), data.len());

    let mut rebuilt = Directory::new(8);
    rebuilt.restore(&data);
    assert_eq!(Some(a), rebuilt.namei("alpha"));
    assert_eq!(Some(b), rebuilt.namei("beta"));
    assert_eq!(Some(0), rebuilt.namei("/"));
    assert_eq!(None, rebuilt.namei("gamma"));
}

#[test]
fn directory_truncates_long_names() {
    let mut dir = Directory::new(4);
    let long = "x".repeat(NAME_CAP + 10);
    let inum = dir.ialloc(&long).unwrap();
    let (_, stored) = dir.entries().find(|&(i, _)| i == inum).unwrap();
    assert_eq!(NAME_CAP, stored.len());
}
