//! Parsing of `LIST`/`MLSD` response lines into a directory entry the
//! adapter can turn into a `fuser::FileAttr`.
//!
//! Two formats are recognised: Unix `ls -l` style and MLSD facts (RFC
//! 3659). There is no in-scope scenario involving a Windows/IIS-style FTP
//! server, so that third format is intentionally not handled.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Reported as a regular file using the listed size — see
    /// `SPEC_FULL.md` §9 for the rationale.
    Symlink,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl DirEntry {
    pub fn file(name: &str, size: u64) -> Self {
        Self { name: name.to_string(), kind: EntryKind::File, size, modified: None }
    }

    pub fn dir(name: &str) -> Self {
        Self { name: name.to_string(), kind: EntryKind::Directory, size: 0, modified: None }
    }

    /// Attempt to parse one line of a `LIST` or `MLSD` response. Returns
    /// `None` for blank lines and the `.`/`..` pseudo-entries.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let entry = if line.contains('=') && line.contains(';') {
            parse_mlsd(line)?
        } else {
            parse_unix(line)?
        };
        if entry.name == "." || entry.name == ".." {
            return None;
        }
        Some(entry)
    }
}

fn unix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^([dlcbps-][rwxsStT-]{9})\s+   # type + permission bits
            \d+\s+                          # link count
            \S+\s+                          # owner
            \S+\s+                          # group
            (\d+)\s+                        # size
            (\w{3}\s+\d{1,2}\s+[\d:]+)\s+   # date
            (.+)$                           # filename, possibly 'name -> target'
            ",
        )
        .expect("static regex is well-formed")
    })
}

fn parse_unix(line: &str) -> Option<DirEntry> {
    let caps = unix_re().captures(line)?;
    let perms = caps.get(1)?.as_str();
    let size = caps.get(2)?.as_str().parse::<u64>().unwrap_or(0);
    let date_str = caps.get(3)?.as_str();
    let name_raw = caps.get(4)?.as_str();

    let kind = match perms.as_bytes().first() {
        Some(b'd') => EntryKind::Directory,
        Some(b'l') => EntryKind::Symlink,
        Some(b'-') => EntryKind::File,
        _ => EntryKind::Unknown,
    };

    let name = match (kind, name_raw.find(" -> ")) {
        (EntryKind::Symlink, Some(pos)) => name_raw[..pos].to_string(),
        _ => name_raw.to_string(),
    };

    Some(DirEntry { name, kind, size, modified: parse_unix_date(date_str) })
}

fn parse_unix_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let normalised: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let this_year = Utc::now().format("%Y").to_string();

    if let Ok(dt) = NaiveDateTime::parse_from_str(&format!("{this_year} {normalised}"), "%Y %b %d %H:%M") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalised, "%b %d %Y") {
        let dt = date.and_time(NaiveTime::from_hms_opt(0, 0, 0)?);
        return Some(Utc.from_utc_datetime(&dt));
    }
    None
}

fn parse_mlsd(line: &str) -> Option<DirEntry> {
    let (facts_str, name) = if let Some(pos) = line.find("; ") {
        (&line[..pos], line[pos + 2..].to_string())
    } else {
        return None;
    };
    if name.is_empty() {
        return None;
    }

    let mut kind = EntryKind::Unknown;
    let mut size = 0u64;
    let mut modified = None;
    for segment in facts_str.split(';') {
        let Some((key, value)) = segment.trim().split_once('=') else { continue };
        match key.to_lowercase().as_str() {
            "type" => {
                kind = match value.to_lowercase().as_str() {
                    "dir" | "cdir" | "pdir" => EntryKind::Directory,
                    "file" => EntryKind::File,
                    "os.unix=symlink" | "os.unix=slink" => EntryKind::Symlink,
                    _ => EntryKind::Unknown,
                };
            }
            "size" => size = value.parse().unwrap_or(0),
            "modify" => modified = parse_mlsd_time(value),
            _ => {}
        }
    }

    Some(DirEntry { name, kind, size, modified })
}

fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = if s.len() >= 14 { &s[..14] } else { s };
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_file() {
        let e = DirEntry::parse("-rw-r--r--   1 user group  1234 Jan  1 12:00 readme.txt").unwrap();
        assert_eq!(e.name, "readme.txt");
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.size, 1234);
    }

    #[test]
    fn parses_unix_dir() {
        let e = DirEntry::parse("drwxr-xr-x   2 root root  4096 Mar  1 09:30 subdir").unwrap();
        assert_eq!(e.kind, EntryKind::Directory);
    }

    #[test]
    fn parses_unix_symlink_strips_target() {
        let e = DirEntry::parse("lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target").unwrap();
        assert_eq!(e.kind, EntryKind::Symlink);
        assert_eq!(e.name, "link");
    }

    #[test]
    fn parses_mlsd_file() {
        let e = DirEntry::parse("type=file;size=1024;modify=20260101120000; example.bin").unwrap();
        assert_eq!(e.name, "example.bin");
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.size, 1024);
        assert!(e.modified.is_some());
    }

    #[test]
    fn filters_dot_entries() {
        assert!(DirEntry::parse("type=dir;; .").is_none());
        assert!(DirEntry::parse("type=dir;; ..").is_none());
    }

    #[test]
    fn rejects_blank_lines() {
        assert!(DirEntry::parse("").is_none());
        assert!(DirEntry::parse("   ").is_none());
    }
}
