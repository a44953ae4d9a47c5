use std::{
    collections::BTreeSet,
    ffi::OsString,
    fs,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

use magicmount::{
    config::MountConfig,
    mount::{compose_and_mount_with, DryRunMounter, MagicMount, MountOp},
    tree::{NodeKind, TreeBuilder},
};
use nix::sys::stat::{makedev, mknod, Mode, SFlag};
use tempfile::{tempdir, TempDir};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A device layout in a temp dir: `root/` stands in for `/`, `modules/` for the module root.
struct Device {
    temp: TempDir,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Device {
    fn new() -> anyhow::Result<Self> {
        let temp = tempdir()?;
        fs::create_dir_all(temp.path().join("root/system"))?;
        fs::create_dir_all(temp.path().join("modules"))?;
        Ok(Self { temp })
    }

    fn root(&self) -> PathBuf {
        self.temp.path().join("root")
    }

    fn work(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    fn module(&self, name: &str) -> PathBuf {
        self.temp.path().join("modules").join(name)
    }

    fn config(&self) -> MountConfig {
        MountConfig::builder()
            .root_dir(self.root())
            .module_dir(self.temp.path().join("modules"))
            .work_dir(self.work())
            .build()
    }

    fn write(&self, path: PathBuf, contents: &str) -> anyhow::Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn names(dir: &Path) -> anyhow::Result<BTreeSet<OsString>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        names.insert(entry?.file_name());
    }
    Ok(names)
}

fn set(items: &[&str]) -> BTreeSet<OsString> {
    items.iter().map(OsString::from).collect()
}

/// Creates an overlay whiteout, returning `false` where device nodes cannot be created.
fn make_whiteout(path: &Path) -> anyhow::Result<bool> {
    match mknod(path, SFlag::S_IFCHR, Mode::empty(), makedev(0, 0)) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EPERM) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test]
fn test_magic_mount_composes_modules_end_to_end() -> anyhow::Result<()> {
    let device = Device::new()?;
    let root = device.root();
    let work = device.work();
    let staging = work.join("overlay_tmp");
    device.write(work.join("notes.txt"), "kept")?;

    device.write(root.join("system/etc/foo.conf"), "real")?;
    device.write(root.join("system/bin/sh"), "real sh")?;
    device.write(root.join("system/lib/bad"), "real file")?;

    let a_foo = device.write(device.module("a").join("system/etc/foo.conf"), "a")?;
    device.write(device.module("b").join("system/etc/foo.conf"), "b")?;
    let newtool = device.write(device.module("b").join("system/bin/newtool"), "tool")?;
    let inner = device.write(device.module("b").join("system/lib/bad/inner.so"), "so")?;

    let mounter = DryRunMounter::new();
    compose_and_mount_with(&device.config(), &mounter)?;
    let ops = mounter.ops();

    // The first module wins the conflicting file, bound straight onto the real path.
    assert!(ops.contains(&MountOp::Bind {
        from: a_foo,
        to: root.join("system/etc/foo.conf"),
    }));
    assert!(!ops.iter().any(|op| matches!(
        op,
        MountOp::Bind { from, .. } if from.starts_with(device.module("b").join("system/etc"))
    )));

    // A new file forces `/system/bin` into staging; the real `sh` is mirrored.
    let staged_bin = staging.join("system/bin");
    for op in [
        MountOp::Bind {
            from: staged_bin.clone(),
            to: staged_bin.clone(),
        },
        MountOp::Bind {
            from: root.join("system/bin/sh"),
            to: staged_bin.join("sh"),
        },
        MountOp::Bind {
            from: newtool,
            to: staged_bin.join("newtool"),
        },
        MountOp::Move {
            from: staged_bin.clone(),
            to: root.join("system/bin"),
        },
        MountOp::Private {
            target: root.join("system/bin"),
            recursive: true,
        },
    ] {
        assert!(ops.contains(&op), "missing {}", op);
    }

    // A module directory where the device has a file forces `/system/lib` into staging.
    let staged_lib = staging.join("system/lib");
    assert!(ops.contains(&MountOp::Bind {
        from: inner,
        to: staged_lib.join("bad/inner.so"),
    }));
    assert!(ops.contains(&MountOp::Move {
        from: staged_lib,
        to: root.join("system/lib"),
    }));

    // `/system/etc` was never staged.
    assert!(!ops
        .iter()
        .any(|op| matches!(op, MountOp::Move { to, .. } if to == &root.join("system/etc"))));

    // Each staging directory is moved only after all of its own mounts.
    let move_pos = ops
        .iter()
        .position(|op| matches!(op, MountOp::Move { to, .. } if to == &root.join("system/bin")))
        .unwrap();
    assert!(ops[move_pos..].iter().all(|op| !matches!(
        op,
        MountOp::Bind { to, .. } if to.starts_with(&staged_bin)
    )));

    assert_eq!(
        ops.last(),
        Some(&MountOp::Unmount {
            target: staging.clone()
        })
    );
    assert!(!staging.exists());
    assert_eq!(fs::read_to_string(work.join("notes.txt"))?, "kept");

    Ok(())
}

#[test_log::test]
fn test_magic_mount_staged_listing_is_union_of_virtual_and_mirrored() -> anyhow::Result<()> {
    let device = Device::new()?;
    let root = device.root();
    let work = device.work();
    fs::create_dir_all(&work)?;

    device.write(root.join("system/fonts/a.ttf"), "a")?;
    device.write(root.join("system/fonts/b.ttf"), "b")?;
    fs::create_dir_all(root.join("system/fonts/sub"))?;
    device.write(root.join("system/fonts/sub/c.ttf"), "c")?;

    let fonts = device.module("emoji").join("system/fonts");
    device.write(fonts.join("b.ttf"), "module b")?;
    device.write(fonts.join("emoji.ttf"), "emoji")?;
    symlink("emoji.ttf", fonts.join("color.ttf"))?;

    let whiteout = make_whiteout(&fonts.join("a.ttf"))?;

    let config = device.config();
    let tree = TreeBuilder::new(&config).build()?.unwrap();
    let mounter = DryRunMounter::new();
    MagicMount::new(&config, &mounter).mount_tree(tree, &work)?;

    let staged = work.join("system/fonts");
    let expected = if whiteout {
        set(&["b.ttf", "color.ttf", "emoji.ttf", "sub"])
    } else {
        set(&["a.ttf", "b.ttf", "color.ttf", "emoji.ttf", "sub"])
    };
    assert_eq!(names(&staged)?, expected);
    assert_eq!(names(&staged.join("sub"))?, set(&["c.ttf"]));
    assert_eq!(
        fs::read_link(staged.join("color.ttf"))?,
        PathBuf::from("emoji.ttf")
    );

    // The module's `b.ttf` covers the real one rather than the real one being mirrored.
    let ops = mounter.ops();
    assert!(ops.contains(&MountOp::Bind {
        from: fonts.join("b.ttf"),
        to: staged.join("b.ttf"),
    }));
    assert!(!ops.contains(&MountOp::Bind {
        from: root.join("system/fonts/b.ttf"),
        to: staged.join("b.ttf"),
    }));

    Ok(())
}

#[test_log::test]
fn test_magic_mount_opaque_directory_hides_real_children() -> anyhow::Result<()> {
    let device = Device::new()?;
    let root = device.root();
    let work = device.work();
    fs::create_dir_all(&work)?;

    device.write(root.join("system/media/boot.zip"), "stock")?;
    device.write(root.join("system/media/shutdown.zip"), "stock")?;

    let media = device.module("anim").join("system/media");
    device.write(media.join("boot.zip"), "custom")?;

    // Opaque directories are marked in the trusted namespace, which needs privileges.
    if xattr::set(&media, "trusted.overlay.opaque", b"y").is_err() {
        return Ok(());
    }

    let config = device.config();
    let tree = TreeBuilder::new(&config).build()?.unwrap();
    let media_node = tree.child("system").and_then(|s| s.child("media")).unwrap();
    assert!(media_node.get_opaque());
    assert_eq!(media_node.get_kind(), NodeKind::Directory);

    let mounter = DryRunMounter::new();
    MagicMount::new(&config, &mounter).mount_tree(tree, &work)?;

    assert_eq!(names(&work.join("system/media"))?, set(&["boot.zip"]));

    Ok(())
}

#[test_log::test]
fn test_magic_mount_skip_mount_module_contributes_nothing() -> anyhow::Result<()> {
    let device = Device::new()?;
    device.write(device.root().join("system/bin/sh"), "real")?;
    device.write(device.module("quiet").join("system/bin/sh"), "module")?;
    device.write(device.module("quiet").join("skip_mount"), "")?;

    let mounter = DryRunMounter::new();
    compose_and_mount_with(&device.config(), &mounter)?;

    assert!(mounter.ops().is_empty());
    assert!(TreeBuilder::new(&device.config()).build()?.is_none());

    Ok(())
}
