//! Shell-script stand-ins for the ffprobe and ffmpeg binaries.

use std::path::{Path, PathBuf};

#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark script executable");
    path
}

/// ffprobe that reports one audio and one video stream of the given size.
///
/// The probed path is the sixth argument.
#[cfg(unix)]
pub fn fake_ffprobe(dir: &Path, width: u32, height: u32) -> PathBuf {
    let body = format!(
        r#"test -s "$6" || {{ echo "$6: No such file or directory" >&2; exit 1; }}
echo '{{"streams":[{{"index":0,"codec_type":"audio","sample_rate":"48000"}},{{"index":1,"codec_type":"video","codec_name":"h264","width":{},"height":{}}}]}}'"#,
        width, height
    );
    write_script(dir, "ffprobe", &body)
}

#[cfg(unix)]
pub fn failing_ffprobe(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffprobe",
        r#"echo "$6: Invalid data found when processing input" >&2
exit 1"#,
    )
}

#[cfg(unix)]
pub fn sleeping_tool(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "sleep 30")
}

/// ffmpeg that copies its input (sixth argument) to its output (last argument).
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        r#"in="$6"
for out; do :; done
cp "$in" "$out""#,
    )
}

/// ffmpeg that exits successfully without writing anything
#[cfg(unix)]
pub fn silent_ffmpeg(dir: &Path) -> PathBuf {
    write_script(dir, "ffmpeg", "exit 0")
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
