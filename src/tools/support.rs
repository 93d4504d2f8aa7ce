//! Shared helpers used by several tool handlers: repo-root discovery, safe
//! file reads, craft-section extraction, git log tailing, and the
//! handoff/HDR document scans `herd_catchup` and `herd_assume` both need
//! (SPEC_FULL §11.3/§11.4). Grounded on `herd_mcp/tools/_helpers.py` and the
//! duplicated logic in `spawn.py`/`assume_role.py`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Maps a current (or legacy, pre-resolution) agent code to its section
/// header in `.herd/craft.md`. Current names only — callers run
/// `tiers::resolve_legacy` first.
pub const CRAFT_SECTION_HEADERS: [(&str, &str); 8] = [
    ("mason", "## Mason — Backend Craft Standards"),
    ("fresco", "## Fresco — Frontend Craft Standards"),
    ("scribe", "## Scribe — Documentation Standards"),
    ("wardenstein", "## Wardenstein — QA Craft Standards"),
    ("steve", "## Steve — Coordination Craft Standards"),
    ("leonardo", "## Leonardo — Coordination Craft Standards"),
    ("vigil", "## Vigil — Automated QA Standards"),
    ("rook", "## Rook — Mechanical Execution Standards"),
];

/// Walks up from `start` looking for a `.git` entry. Falls back to `start`
/// itself if none is found, rather than erroring — callers treat a missing
/// repo root as "no git history available", not a hard failure.
pub fn find_repo_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(".git").exists() {
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return start.to_path_buf(),
        }
    }
}

pub fn read_file_safe(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Resolves a `.herd/<subpath>` content path: project root first, falling
/// back to `None` if absent there (no package-root fallback — this crate has
/// no installed-package content tree to fall back to).
pub fn herd_content_path(repo_root: &Path, subpath: &str) -> Option<PathBuf> {
    let candidate = repo_root.join(".herd").join(subpath);
    if candidate.exists() { Some(candidate) } else { None }
}

/// Extracts the agent's slice of `craft.md`: from its section header up to
/// (not including) the next `## ... —` header.
pub fn extract_craft_section(craft_content: &str, agent_code: &str) -> String {
    let Some((_, header)) = CRAFT_SECTION_HEADERS.iter().find(|(code, _)| *code == agent_code) else {
        return String::new();
    };
    let Some(start) = craft_content.find(header) else {
        return String::new();
    };
    let rest = &craft_content[start..];
    let mut section_lines = Vec::new();
    for (i, line) in rest.lines().enumerate() {
        if i > 0 && line.starts_with("## ") && line.contains('\u{2014}') {
            break;
        }
        section_lines.push(line);
    }
    section_lines.join("\n")
}

/// True for ids shaped like a tracker issue identifier (`ABC-123`): an
/// uppercase-alphabetic prefix, a dash, and a numeric suffix. Tickets
/// created locally via `herd_create_ticket` get whatever code the tracker
/// adapter hands back, which already satisfies this; the check exists for
/// callers (`herd_assign`, `herd_transition`, `herd_spawn`) that receive a
/// bare ticket id from an agent and must decide whether it's worth an
/// auto-register-from-tracker round trip.
pub fn looks_like_tracker_id(id: &str) -> bool {
    let Some((prefix, suffix)) = id.split_once('-') else { return false };
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_uppercase()) && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
}

pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

/// `git log --since=<cutoff>` in the repo, newest first. Returns an empty
/// vec (not an error) if `git` isn't available or the directory isn't a repo
/// — matches the original's blanket exception swallowing.
pub fn git_log_since(repo_root: &Path, since: DateTime<Utc>, limit: usize) -> Vec<CommitRecord> {
    let Ok(output) = std::process::Command::new("git")
        .arg("log")
        .arg(format!("--since={}", since.to_rfc3339()))
        .arg(format!("-{limit}"))
        .arg("--format=%H|||%an|||%ai|||%s")
        .current_dir(repo_root)
        .output()
    else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.splitn(4, "|||").collect();
            if parts.len() == 4 {
                Some(CommitRecord { sha: parts[0].to_string(), author: parts[1].to_string(), date: parts[2].to_string(), message: parts[3].to_string() })
            } else {
                None
            }
        })
        .collect()
}

/// Recent commits formatted as one line each, newest first — the form
/// `herd_assume`'s identity prompt embeds directly.
pub fn recent_git_log_text(repo_root: &Path, limit: usize) -> String {
    let output = std::process::Command::new("git")
        .arg("log")
        .arg(format!("-{limit}"))
        .arg("--format=%h %ai %s")
        .current_dir(repo_root)
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if text.is_empty() { "(no recent commits)".to_string() } else { text }
        }
        _ => "(no git history available)".to_string(),
    }
}

pub struct HandoffFile {
    pub filename: String,
    pub modified: DateTime<Utc>,
}

/// Handoff documents under `.herd/handoffs/` modified at or after `since`.
pub fn get_handoffs(repo_root: &Path, since: DateTime<Utc>) -> Vec<HandoffFile> {
    scan_dir_since(&repo_root.join(".herd").join("handoffs"), since)
        .into_iter()
        .map(|(filename, modified)| HandoffFile { filename, modified })
        .collect()
}

pub struct HdrFile {
    pub filename: String,
    pub title: String,
}

/// HDR documents under `.herd/hdr/` modified at or after `since`. Title is
/// the first `# `-prefixed line, falling back to the filename.
pub fn get_recent_hdrs(repo_root: &Path, since: DateTime<Utc>) -> Vec<HdrFile> {
    scan_dir_since(&repo_root.join(".herd").join("hdr"), since)
        .into_iter()
        .map(|(filename, _)| {
            let path = repo_root.join(".herd").join("hdr").join(&filename);
            let title = read_file_safe(&path)
                .and_then(|content| content.lines().find(|l| l.starts_with("# ")).map(|l| l.trim_start_matches("# ").to_string()))
                .unwrap_or_else(|| filename.clone());
            HdrFile { filename, title }
        })
        .collect()
}

fn scan_dir_since(dir: &Path, since: DateTime<Utc>) -> Vec<(String, DateTime<Utc>)> {
    let Ok(entries) = std::fs::read_dir(dir) else { return Vec::new() };
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        let modified: DateTime<Utc> = modified.into();
        if modified >= since {
            out.push((entry.file_name().to_string_lossy().to_string(), modified));
        }
    }
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_root_falls_back_to_start_when_no_git_found() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_repo_root(dir.path());
        assert_eq!(found, dir.path());
    }

    #[test]
    fn repo_root_finds_git_directory_upward() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_repo_root(&nested), dir.path());
    }

    #[test]
    fn craft_section_extracts_until_next_header() {
        let craft = "## Mason — Backend Craft Standards\nwrite tests\nno unwrap\n## Fresco — Frontend Craft Standards\nuse hooks\n";
        let section = extract_craft_section(craft, "mason");
        assert!(section.contains("write tests"));
        assert!(!section.contains("use hooks"));
    }

    #[test]
    fn craft_section_missing_for_unknown_agent_is_empty() {
        assert_eq!(extract_craft_section("## Mason — x\n", "nobody"), "");
    }

    #[test]
    fn tracker_id_shape() {
        assert!(looks_like_tracker_id("DBC-123"));
        assert!(!looks_like_tracker_id("dbc-123"));
        assert!(!looks_like_tracker_id("no-dash-here"));
        assert!(!looks_like_tracker_id("DBC"));
    }

    #[test]
    fn handoffs_empty_when_directory_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_handoffs(dir.path(), Utc::now() - chrono::Duration::days(7)).is_empty());
    }
}
