//! In-memory disk images shared by the integration tests.
#![allow(dead_code)]

use drivers::RamDisk;

pub const SECTOR: usize = 512;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// FAT12 volume:
// sector 0 boot, 1-2 FATs, 3 root directory, 4.. data (cluster 2 = sector 4)

pub const FAT_SECTORS: usize = 64;
pub const HELLO_TXT_LEN: usize = 700;
pub const NOTE_MD: &[u8] = b"hello notes";

pub fn hello_txt() -> Vec<u8> {
    (0..HELLO_TXT_LEN).map(|i| (i % 251) as u8).collect()
}

fn fat12_set(fat: &mut [u8], cluster: usize, value: u16) {
    let offset = cluster + cluster / 2;
    let pair = u16::from_le_bytes([fat[offset], fat[offset + 1]]);
    let pair = if cluster & 1 == 1 {
        (pair & 0x000F) | (value << 4)
    } else {
        (pair & 0xF000) | (value & 0x0FFF)
    };
    fat[offset..offset + 2].copy_from_slice(&pair.to_le_bytes());
}

fn fat_slot(name: &[u8; 11], attributes: u8, cluster: u16, size: u32) -> [u8; 32] {
    let mut slot = [0u8; 32];
    slot[..11].copy_from_slice(name);
    slot[0x0B] = attributes;
    put_u16(&mut slot, 0x1A, cluster);
    put_u32(&mut slot, 0x1C, size);
    slot
}

fn fat_cluster(image: &mut [u8], cluster: usize) -> &mut [u8] {
    let start = (4 + cluster - 2) * SECTOR;
    &mut image[start..start + SECTOR]
}

/// FAT12 volume holding `HELLO.TXT` (two clusters) and `DOCS/NOTE.MD`
pub fn fat12_image() -> Vec<u8> {
    let mut image = vec![0u8; FAT_SECTORS * SECTOR];

    let boot = &mut image[..SECTOR];
    boot[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    boot[3..11].copy_from_slice(b"MSWIN4.1");
    put_u16(boot, 0x0B, SECTOR as u16);
    boot[0x0D] = 1;
    put_u16(boot, 0x0E, 1);
    boot[0x10] = 2;
    put_u16(boot, 0x11, 16);
    put_u16(boot, 0x13, FAT_SECTORS as u16);
    boot[0x15] = 0xF8;
    put_u16(boot, 0x16, 1);
    boot[0x1FE] = 0x55;
    boot[0x1FF] = 0xAA;

    let mut fat = [0u8; SECTOR];
    fat12_set(&mut fat, 0, 0xFF8);
    fat12_set(&mut fat, 1, 0xFFF);
    fat12_set(&mut fat, 2, 3);
    fat12_set(&mut fat, 3, 0xFFF);
    fat12_set(&mut fat, 4, 0xFFF);
    fat12_set(&mut fat, 5, 0xFFF);
    image[SECTOR..2 * SECTOR].copy_from_slice(&fat);
    image[2 * SECTOR..3 * SECTOR].copy_from_slice(&fat);

    let mut long_name = fat_slot(b"Ah\0e\0l\0l\0o\0", 0x0F, 0, 0);
    long_name[0] = 0x41;
    let mut deleted = fat_slot(b"OLD     TXT", 0x20, 9, 10);
    deleted[0] = 0xE5;
    let root = [
        fat_slot(b"TESTVOL    ", 0x08, 0, 0),
        long_name,
        fat_slot(b"HELLO   TXT", 0x20, 2, HELLO_TXT_LEN as u32),
        deleted,
        fat_slot(b"DOCS       ", 0x10, 4, 0),
    ];
    for (i, slot) in root.iter().enumerate() {
        let offset = 3 * SECTOR + i * 32;
        image[offset..offset + 32].copy_from_slice(slot);
    }

    let hello = hello_txt();
    fat_cluster(&mut image, 2).copy_from_slice(&hello[..SECTOR]);
    fat_cluster(&mut image, 3)[..HELLO_TXT_LEN - SECTOR].copy_from_slice(&hello[SECTOR..]);

    let docs = [
        fat_slot(b".          ", 0x10, 4, 0),
        fat_slot(b"..         ", 0x10, 0, 0),
        fat_slot(b"NOTE    MD ", 0x20, 5, NOTE_MD.len() as u32),
    ];
    let dir = fat_cluster(&mut image, 4);
    for (i, slot) in docs.iter().enumerate() {
        dir[i * 32..(i + 1) * 32].copy_from_slice(slot);
    }
    fat_cluster(&mut image, 5)[..NOTE_MD.len()].copy_from_slice(NOTE_MD);

    image
}

// ext2 volume with 1 KiB blocks:
// 1 superblock, 2 group descriptors, 5-6 inode table, 7.. directories and data

pub const EXT2_BLOCK: usize = 1024;
pub const EXT2_BLOCKS: usize = 64;
pub const HELLO_EXT2: &[u8] = b"Hello, ext2!\n";
pub const MOTD: &[u8] = b"welcome to the test\n";
pub const BIG_BIN_LEN: usize = 14 * EXT2_BLOCK - 336;

/// Contents of `big.bin`; its second block is a hole
pub fn big_bin() -> Vec<u8> {
    (0..BIG_BIN_LEN)
        .map(|i| if i / EXT2_BLOCK == 1 { 0 } else { (i % 253) as u8 })
        .collect()
}

fn ext2_block(image: &mut [u8], block: usize) -> &mut [u8] {
    &mut image[block * EXT2_BLOCK..(block + 1) * EXT2_BLOCK]
}

fn ext2_inode(image: &mut [u8], ino: usize, mode: u16, size: u32, blocks: &[u32]) {
    let offset = 5 * EXT2_BLOCK + (ino - 1) * 128;
    let inode = &mut image[offset..offset + 128];
    put_u16(inode, 0, mode);
    put_u32(inode, 4, size);
    put_u16(inode, 26, 1);
    for (i, &block) in blocks.iter().enumerate() {
        put_u32(inode, 40 + i * 4, block);
    }
}

fn ext2_dir(block: &mut [u8], records: &[(u32, &str, u8)]) {
    let mut offset = 0;
    for (i, &(ino, name, file_type)) in records.iter().enumerate() {
        let rec_len = if i + 1 == records.len() {
            EXT2_BLOCK - offset
        } else {
            (8 + name.len()).next_multiple_of(4)
        };
        put_u32(block, offset, ino);
        put_u16(block, offset + 4, rec_len as u16);
        block[offset + 6] = name.len() as u8;
        block[offset + 7] = file_type;
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name.as_bytes());
        offset += rec_len;
    }
}

/// ext2 volume holding `hello.txt`, `big.bin` (indirect block and a hole)
/// and `etc/motd`
pub fn ext2_image() -> Vec<u8> {
    ext2_image_with_incompat(0x0002)
}

pub fn ext2_image_with_incompat(feature_incompat: u32) -> Vec<u8> {
    let mut image = vec![0u8; EXT2_BLOCKS * EXT2_BLOCK];

    let sb = ext2_block(&mut image, 1);
    put_u32(sb, 0, 16);
    put_u32(sb, 4, EXT2_BLOCKS as u32);
    put_u32(sb, 20, 1);
    put_u32(sb, 24, 0);
    put_u32(sb, 32, 8192);
    put_u32(sb, 40, 16);
    put_u16(sb, 56, 0xEF53);
    put_u32(sb, 76, 1);
    put_u16(sb, 88, 128);
    put_u32(sb, 96, feature_incompat);

    let gdt = ext2_block(&mut image, 2);
    put_u32(gdt, 0, 3);
    put_u32(gdt, 4, 4);
    put_u32(gdt, 8, 5);

    ext2_inode(&mut image, 2, 0x41ED, EXT2_BLOCK as u32, &[7]);
    ext2_inode(&mut image, 12, 0x81A4, HELLO_EXT2.len() as u32, &[8]);
    let mut big_blocks = [0u32; 13];
    for (i, block) in big_blocks.iter_mut().take(12).enumerate() {
        *block = if i == 1 { 0 } else { 9 + i as u32 };
    }
    big_blocks[12] = 21;
    ext2_inode(&mut image, 13, 0x81A4, BIG_BIN_LEN as u32, &big_blocks);
    ext2_inode(&mut image, 14, 0x41ED, EXT2_BLOCK as u32, &[24]);
    ext2_inode(&mut image, 15, 0x81A4, MOTD.len() as u32, &[25]);

    ext2_dir(
        ext2_block(&mut image, 7),
        &[
            (2, ".", 2),
            (2, "..", 2),
            (12, "hello.txt", 1),
            (0, "gone", 1),
            (13, "big.bin", 1),
            (14, "etc", 2),
        ],
    );
    ext2_block(&mut image, 8)[..HELLO_EXT2.len()].copy_from_slice(HELLO_EXT2);

    // big.bin: logical blocks 0 and 2..11 direct, 12..13 through block 21
    let big = big_bin();
    let mut physical: Vec<(usize, usize)> = (0..12)
        .filter(|&i| i != 1)
        .map(|i| (i, 9 + i))
        .collect();
    physical.extend([(12, 22), (13, 23)]);
    let indirect = ext2_block(&mut image, 21);
    put_u32(indirect, 0, 22);
    put_u32(indirect, 4, 23);
    for (logical, block) in physical {
        let start = logical * EXT2_BLOCK;
        let end = (start + EXT2_BLOCK).min(BIG_BIN_LEN);
        ext2_block(&mut image, block)[..end - start].copy_from_slice(&big[start..end]);
    }

    ext2_dir(
        ext2_block(&mut image, 24),
        &[(14, ".", 2), (2, "..", 2), (15, "motd", 1)],
    );
    ext2_block(&mut image, 25)[..MOTD.len()].copy_from_slice(MOTD);

    image
}

/// A partition to place on an MBR disk
pub struct Slot<'a> {
    pub index: usize,
    pub partition_type: u8,
    pub start: u32,
    pub image: &'a [u8],
}

/// Disk with a signed MBR and the given partitions laid out on it
pub fn mbr_disk(name: &str, slots: &[Slot<'_>]) -> RamDisk {
    let end = slots
        .iter()
        .map(|s| s.start as usize * SECTOR + s.image.len())
        .max()
        .unwrap_or(SECTOR)
        .max(SECTOR);
    let mut image = vec![0u8; end];

    for slot in slots {
        let entry = 0x1BE + slot.index * 16;
        image[entry + 4] = slot.partition_type;
        put_u32(&mut image, entry + 8, slot.start);
        put_u32(&mut image, entry + 12, (slot.image.len() / SECTOR) as u32);

        let start = slot.start as usize * SECTOR;
        image[start..start + slot.image.len()].copy_from_slice(slot.image);
    }
    image[0x1FE] = 0x55;
    image[0x1FF] = 0xAA;

    RamDisk::from_image(name, SECTOR, image)
}
