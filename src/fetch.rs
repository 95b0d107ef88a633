//! Source fetchers: repository snapshots and webpages.
//!
//! The repository fetcher never shells out to `git`: it validates the URL
//! shape, resolves the default branch through the host's repository
//! metadata API, downloads a snapshot archive, and extracts it into a
//! destination directory (clearing any prior contents first).
//!
//! The webpage fetcher strips HTML to plain text with an event-based
//! reader, producing one [`SourceDocument`] whose source id is the URL.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::SourceDocument;

/// Validated pieces of an `https://<host>/<owner>/<repo>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

/// Validate a repository URL. Trailing slashes and a `.git` suffix are
/// tolerated; anything not matching the three-segment shape is rejected.
pub fn parse_repo_url(url: &str) -> Result<RepoUrl> {
    let rest = url
        .strip_prefix("https://")
        .ok_or_else(|| Error::InvalidRepoUrl(format!("{url}: must start with https://")))?;
    let rest = rest.trim_end_matches('/');

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidRepoUrl(format!(
            "{url}: expected https://<host>/<owner>/<repo>"
        )));
    }

    Ok(RepoUrl {
        host: segments[0].to_string(),
        owner: segments[1].to_string(),
        repo: segments[2].trim_end_matches(".git").to_string(),
    })
}

/// Resolve the repository's default branch via the host's metadata API
/// (GitHub-style `GET /repos/<owner>/<repo>`).
async fn resolve_default_branch(client: &reqwest::Client, repo: &RepoUrl) -> Result<String> {
    let metadata_url = format!(
        "https://api.{}/repos/{}/{}",
        repo.host, repo.owner, repo.repo
    );

    let response = client
        .get(&metadata_url)
        .header("User-Agent", "devhelper")
        .send()
        .await
        .map_err(|e| Error::RepoMetadataUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::RepoMetadataUnavailable(format!(
            "{} returned {}",
            metadata_url,
            response.status()
        )));
    }

    let json: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::RepoMetadataUnavailable(e.to_string()))?;

    json.get("default_branch")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            Error::RepoMetadataUnavailable("metadata response had no default_branch".to_string())
        })
}

/// Strip the single top-level `<repo>-<branch>/` folder from an archive
/// entry path, rejecting entries that would escape the destination.
fn strip_archive_root(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    // Reject absolute paths and parent traversal (zip-slip).
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return None;
    }
    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Extract a snapshot archive into `dest`, clearing prior contents first.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::ArchiveExtractFailed(e.to_string()))?;

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::ArchiveExtractFailed(e.to_string()))?;

        let Some(relative) = strip_archive_root(entry.name()) else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::ArchiveExtractFailed(e.to_string()))?;
        std::fs::write(&out_path, content)?;
    }

    Ok(())
}

/// Fetch a snapshot of a repository into `dest` and return that path.
pub async fn fetch_repo(url: &str, dest: &Path) -> Result<PathBuf> {
    let repo = parse_repo_url(url)?;

    let client = reqwest::Client::new();
    let branch = resolve_default_branch(&client, &repo).await?;
    debug!(branch, "resolved default branch");

    let archive_url = format!(
        "https://{}/{}/{}/archive/refs/heads/{}.zip",
        repo.host, repo.owner, repo.repo, branch
    );

    let response = client
        .get(&archive_url)
        .header("User-Agent", "devhelper")
        .send()
        .await
        .map_err(|e| Error::ArchiveFetchFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(Error::ArchiveFetchFailed(format!(
            "{} returned {}",
            archive_url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::ArchiveFetchFailed(e.to_string()))?;

    extract_archive(&bytes, dest)?;
    info!(url, dest = %dest.display(), "repository snapshot extracted");
    Ok(dest.to_path_buf())
}

/// Strip HTML to plain text: collect text events, skipping the contents
/// of `script` and `style` elements.
pub fn html_to_text(html: &str) -> String {
    let mut reader = quick_xml::Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text(true);

    let mut out = String::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"script" || name.as_ref() == b"style" {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if (name.as_ref() == b"script" || name.as_ref() == b"style") && skip_depth > 0 {
                    skip_depth -= 1;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if skip_depth == 0 => {
                let text = te
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&te).into_owned());
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(trimmed);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(_) => break, // best-effort: malformed markup ends extraction
            _ => {}
        }
    }

    out
}

/// Fetch a webpage and return it as a single plain-text document.
pub async fn fetch_webpage(url: &str) -> Result<SourceDocument> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header("User-Agent", "devhelper")
        .send()
        .await
        .map_err(|e| Error::InvalidSource(format!("{url}: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::InvalidSource(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    let html = response
        .text()
        .await
        .map_err(|e| Error::InvalidSource(format!("{url}: {e}")))?;

    Ok(SourceDocument::new(html_to_text(&html), url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn parses_valid_repo_url() {
        let repo = parse_repo_url("https://github.com/parallax-labs/devhelper").unwrap();
        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.owner, "parallax-labs");
        assert_eq!(repo.repo, "devhelper");
    }

    #[test]
    fn tolerates_trailing_slash_and_git_suffix() {
        let repo = parse_repo_url("https://github.com/o/r.git/").unwrap();
        assert_eq!(repo.repo, "r");
    }

    #[test]
    fn rejects_malformed_urls() {
        for url in [
            "http://github.com/o/r",
            "https://github.com/o",
            "https://github.com/o/r/extra",
            "https://github.com//r",
            "github.com/o/r",
        ] {
            assert!(
                matches!(parse_repo_url(url), Err(Error::InvalidRepoUrl(_))),
                "accepted: {url}"
            );
        }
    }

    fn make_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn extracts_archive_stripping_top_level_folder() {
        let bytes = make_archive(&[
            ("repo-main/README.md", "# readme"),
            ("repo-main/src/main.py", "print('hi')"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cloned");

        extract_archive(&bytes, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("README.md")).unwrap(), "# readme");
        assert_eq!(
            std::fs::read_to_string(dest.join("src/main.py")).unwrap(),
            "print('hi')"
        );
    }

    #[test]
    fn extraction_clears_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cloned");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), "old").unwrap();

        let bytes = make_archive(&[("repo-main/fresh.txt", "new")]);
        extract_archive(&bytes, &dest).unwrap();
        assert!(!dest.join("stale.txt").exists());
        assert!(dest.join("fresh.txt").exists());
    }

    #[test]
    fn invalid_archive_fails_typed() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_archive(b"not a zip", &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, Error::ArchiveExtractFailed(_)));
    }

    #[test]
    fn traversal_entries_are_ignored() {
        assert!(strip_archive_root("repo-main/../../etc/passwd").is_none());
        assert!(strip_archive_root("/etc/passwd").is_none());
        assert!(strip_archive_root("repo-main").is_none());
    }

    #[test]
    fn html_is_stripped_to_text() {
        let html = "<html><head><title>T</title><style>body{}</style></head>\
                    <body><h1>Hello</h1><p>World &amp; friends</p>\
                    <script>var x = 1;</script></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World & friends"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("body{}"));
    }

    #[test]
    fn webpage_document_keeps_url_as_source_id() {
        let doc = SourceDocument::new(html_to_text("<p>content</p>"), "https://example.com/page");
        assert_eq!(doc.source_id, "https://example.com/page");
        assert_eq!(doc.text, "content");
    }
}
