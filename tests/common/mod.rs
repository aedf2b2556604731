#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const PACK_URL: &str = "https://example.com/pack.toml";
pub const AGENT_JAR: &str = "packwiz-installer-bootstrap.jar";

/// Temp dir holding both the archive and the game directory it installs into.
pub fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let game_dir = tmp.path().join("game");
    std::fs::create_dir_all(&game_dir).unwrap();
    (tmp, game_dir)
}

/// Writes a zip with `entries` in the given order. Names ending in `/` become
/// directory entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    for (name, bytes) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
    }
    writer.finish().unwrap();
}

pub fn instance_cfg(name: &str, game_version: &str) -> String {
    format!(
        "InstanceType=OneSix\nname={}\nIntendedVersion={}\nJvmArgs=-javaagent:{}={}\nnotes=\n",
        name, game_version, AGENT_JAR, PACK_URL
    )
}

pub fn instance_cfg_without_agent(name: &str, game_version: &str) -> String {
    format!("InstanceType=OneSix\nname={}\nIntendedVersion={}\n", name, game_version)
}

/// `mmc-pack.json` with the game component plus `(uid, version)` pairs.
pub fn mmc_pack(game_version: &str, components: &[(&str, Option<&str>)]) -> String {
    let mut list = vec![serde_json::json!({ "uid": "net.minecraft", "version": game_version, "important": true })];
    for (uid, version) in components {
        list.push(match version {
            Some(version) => serde_json::json!({ "uid": uid, "version": version }),
            None => serde_json::json!({ "uid": uid }),
        });
    }
    serde_json::json!({ "formatVersion": 1, "components": list }).to_string()
}

pub fn patch_json(name: &str, version: &str, tweakers: &[&str]) -> String {
    serde_json::json!({
        "formatVersion": 1,
        "uid": format!("org.example.{}", name.to_lowercase()),
        "name": name,
        "version": version,
        "+tweakers": tweakers,
        "libraries": [{ "name": format!("org.example:{}:{}", name.to_lowercase(), version) }]
    })
    .to_string()
}

/// A typical export: everything under `Pack/` with content in `Pack/.minecraft`.
pub fn simple_pack(dir: &Path, extra: &[(&str, &[u8])]) -> PathBuf {
    let cfg = instance_cfg("Pack", "1.20.1");
    let pack = mmc_pack("1.20.1", &[]);

    let mut entries: Vec<(&str, &[u8])> = vec![
        ("Pack/instance.cfg", cfg.as_bytes()),
        ("Pack/mmc-pack.json", pack.as_bytes()),
        ("Pack/.minecraft/options.txt", b"fov:70".as_slice()),
    ];
    entries.extend_from_slice(extra);

    let zip = dir.join("Pack.zip");
    write_zip(&zip, &entries);
    zip
}
