mod common;

use std::sync::Arc;

use common::{MOTD, Slot, ext2_image, fat12_image, hello_txt, init_logger, mbr_disk};
use drivers::{BlockDevice, BlockDeviceError, RamDisk};
use kernel::fs::dispatch::Dispatcher;
use kernel::fs::mbr::{MbrError, read_mbr, read_mbr_with};
use kernel::fs::vfs::{VirtFS, vfs};
use kernel::fs::{FileSystem, OpenMode};

fn three_partition_disk(name: &str) -> Arc<dyn BlockDevice> {
    let fat = fat12_image();
    let ext2 = ext2_image();
    let raw = vec![0xA5u8; 8 * 512];
    Arc::new(mbr_disk(
        name,
        &[
            Slot {
                index: 0,
                partition_type: 0x0C,
                start: 8,
                image: &fat,
            },
            Slot {
                index: 1,
                partition_type: 0x83,
                start: 80,
                image: &ext2,
            },
            Slot {
                index: 3,
                partition_type: 0x07,
                start: 220,
                image: &raw,
            },
        ],
    ))
}

#[test]
fn partitions_are_mounted_by_type() {
    init_logger();
    let disk = three_partition_disk("disk0");
    let vfs = VirtFS::new();

    let partitions = read_mbr_with(&disk, &Dispatcher::standard(), &vfs).unwrap();

    let summary: Vec<(usize, u8, Option<&str>)> = partitions
        .iter()
        .map(|p| (p.index(), p.partition_type(), p.filesystem.as_ref().map(|fs| fs.name())))
        .collect();
    assert_eq!(
        summary,
        [(0, 0x0C, Some("fat")), (1, 0x83, Some("ext2")), (3, 0x07, None)]
    );
    assert_eq!(vfs.mounts(), ["/disk0_0", "/disk0_1"]);
}

#[test]
fn files_are_reachable_through_the_vfs() {
    init_logger();
    let disk = three_partition_disk("disk1");
    let vfs = VirtFS::new();
    read_mbr_with(&disk, &Dispatcher::standard(), &vfs).unwrap();

    let names: Vec<String> = vfs
        .read_directory("/disk1_0")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["HELLO.TXT", "DOCS"]);

    let (fs, entry) = vfs.lookup("/disk1_1/etc/motd").unwrap();
    let mut file = fs.open(&entry, OpenMode::Read).unwrap();
    let mut buf = [0u8; 64];
    let n = fs.read(&mut file, &mut buf).unwrap();
    assert_eq!(&buf[..n], MOTD);

    let (fs, entry) = vfs.lookup("/disk1_0/hello.txt").unwrap();
    let mut file = fs.open(&entry, OpenMode::Read).unwrap();
    let mut buf = vec![0u8; 1024];
    assert_eq!(fs.read(&mut file, &mut buf), Ok(700));
    assert_eq!(&buf[..700], &hello_txt()[..]);
}

#[test]
fn raw_partition_reads_are_translated() {
    init_logger();
    let disk = three_partition_disk("disk2");
    let partitions = read_mbr_with(&disk, &Dispatcher::standard(), &VirtFS::new()).unwrap();

    let raw = partitions[2].block_device();
    assert_eq!(raw.device_name(), "disk2_3");
    let mut buf = [0u8; 512];
    assert_eq!(raw.read(&mut buf, 7), Ok(512));
    assert!(buf.iter().all(|&b| b == 0xA5));
    assert_eq!(raw.read(&mut buf, 8), Err(BlockDeviceError::InvalidAddress));
}

#[test]
fn unrecognized_contents_leave_partition_raw() {
    init_logger();
    let garbage = vec![0u8; 16 * 512];
    let disk: Arc<dyn BlockDevice> = Arc::new(mbr_disk(
        "disk3",
        &[
            Slot {
                index: 0,
                partition_type: 0x0B,
                start: 4,
                image: &garbage,
            },
            Slot {
                index: 1,
                partition_type: 0x83,
                start: 20,
                image: &garbage,
            },
        ],
    ));
    let vfs = VirtFS::new();

    let partitions = read_mbr_with(&disk, &Dispatcher::standard(), &vfs).unwrap();
    assert_eq!(partitions.len(), 2);
    assert!(partitions.iter().all(|p| p.filesystem.is_none()));
    assert!(vfs.mounts().is_empty());
}

#[test]
fn unsigned_disk_is_rejected() {
    init_logger();
    let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::from_image("disk4", 512, fat12_image()));
    let mut image = fat12_image();
    image[0x1FF] = 0;
    let unsigned: Arc<dyn BlockDevice> = Arc::new(RamDisk::from_image("disk5", 512, image));

    // a bare FAT volume is signed but has an empty table
    assert!(read_mbr_with(&disk, &Dispatcher::new(), &VirtFS::new()).is_ok());
    assert_eq!(
        read_mbr_with(&unsigned, &Dispatcher::standard(), &VirtFS::new()).unwrap_err(),
        MbrError::InvalidFormat {
            signature: [0x55, 0x00]
        }
    );
}

#[test]
fn global_registry() {
    init_logger();
    let disk = three_partition_disk("global0");
    let partitions = read_mbr(&disk).unwrap();
    assert_eq!(partitions.len(), 3);

    let fs = vfs().filesystem("/global0_1").unwrap();
    assert_eq!(fs.name(), "ext2");
    assert!(vfs().filesystem("/global0_3").is_none());

    // discovering the same disk again finds the prefixes taken
    let again = read_mbr(&disk).unwrap();
    assert!(again[0].filesystem.is_some());
    assert!(!Arc::ptr_eq(
        again[0].filesystem.as_ref().unwrap(),
        &vfs().filesystem("/global0_0").unwrap()
    ));
}
