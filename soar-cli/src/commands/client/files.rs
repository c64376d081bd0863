use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use crate::commands::{json_body, Api};
use crate::http::{normalize_collection, normalize_item};

const DIRECTORY_MIME: &str = "inode/directory";

#[derive(Subcommand, Debug)]
pub enum FilesCommands {
    /// List files in a directory
    List {
        id: String,
        /// Directory to list
        #[arg(long, default_value = "/")]
        root: String,
        /// Only show directories
        #[arg(short = 'd', long, conflicts_with = "file_only")]
        dir_only: bool,
        /// Only show files
        #[arg(short = 'f', long)]
        file_only: bool,
    },
    /// Show the entry for one file
    Info {
        id: String,
        name: String,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Print the contents of a file
    Contents { id: String, path: String },
    /// Download a file through a signed URL
    Download {
        id: String,
        path: String,
        /// Local destination (defaults to the file name)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Print the signed URL instead of downloading
        #[arg(short = 'U', long)]
        url_only: bool,
        /// Overwrite an existing destination
        #[arg(long)]
        force: bool,
    },
    /// Rename or move a file
    Rename {
        id: String,
        from: String,
        to: String,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Duplicate a file in place
    Copy { id: String, path: String },
    /// Write content to a file, replacing it
    Write {
        id: String,
        path: String,
        content: String,
    },
    /// Create an empty file
    Create { id: String, path: String },
    /// Archive files into a new compressed file
    Compress {
        id: String,
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Extract an archive
    Decompress {
        id: String,
        name: String,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Delete files
    Delete {
        id: String,
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Create a directory
    Mkdir {
        id: String,
        name: String,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Change file permissions
    Chmod {
        id: String,
        name: String,
        /// Octal mode, e.g. 644
        mode: u32,
        #[arg(long, default_value = "/")]
        root: String,
    },
    /// Have the node fetch a remote file
    Pull {
        id: String,
        url: String,
        /// Directory to save into
        #[arg(long)]
        dest: Option<String>,
        /// File name to save as
        #[arg(long)]
        name: Option<String>,
        /// Use the Content-Disposition header for the name
        #[arg(long)]
        use_header: bool,
        /// Wait for the download to finish
        #[arg(long)]
        foreground: bool,
    },
    /// Upload local files through a signed URL
    Upload {
        id: String,
        files: Vec<PathBuf>,
        /// Remote directory to upload into
        #[arg(long)]
        dest: Option<String>,
        /// Print the signed URL instead of uploading
        #[arg(short = 'U', long)]
        url_only: bool,
    },
}

pub fn handle(api: &Api<'_>, cmd: FilesCommands) -> Result<()> {
    match cmd {
        FilesCommands::List {
            id,
            root,
            dir_only,
            file_only,
        } => {
            let listing = fetch_listing(api, &id, &root)?;
            let listing = match (dir_only, file_only) {
                (true, _) => retain(listing, |entry| is_directory(entry))?,
                (_, true) => retain(listing, |entry| !is_directory(entry))?,
                _ => listing,
            };

            let out = normalize_collection(&listing, api.ctx().policy())?;
            api.ctx().write(&out)
        }
        FilesCommands::Info { id, name, root } => {
            let listing: Value = serde_json::from_slice(&fetch_listing(api, &id, &root)?)
                .context("failed to parse response")?;
            let entry = listing
                .get("data")
                .and_then(Value::as_array)
                .and_then(|data| {
                    data.iter().find(|entry| {
                        entry.pointer("/attributes/name").and_then(Value::as_str) == Some(name.as_str())
                    })
                })
                .with_context(|| format!("file '{name}' not found"))?;

            let out = normalize_item(&serde_json::to_vec(entry)?, api.ctx().policy())?;
            api.ctx().write(&out)
        }
        FilesCommands::Contents { id, path } => {
            let req = api
                .request(Method::GET, &format!("/api/client/servers/{id}/files/contents"), None)?
                .query("file", &path)
                .header(ACCEPT, "text/plain")?;
            api.raw(req)
        }
        FilesCommands::Download {
            id,
            path,
            dest,
            url_only,
            force,
        } => download(api, &id, &path, dest, url_only, force),
        FilesCommands::Rename { id, from, to, root } => {
            let body = json_body(json!({"root": root, "files": [{"from": from, "to": to}]}))?;
            api.run(api.request(Method::PUT, &format!("/api/client/servers/{id}/files/rename"), body)?)?;
            api.ctx().log().info(&format!("renamed '{from}' to '{to}'"));
            Ok(())
        }
        FilesCommands::Copy { id, path } => {
            let body = json_body(json!({"location": path}))?;
            api.run(api.request(Method::POST, &format!("/api/client/servers/{id}/files/copy"), body)?)
        }
        FilesCommands::Write { id, path, content } => {
            let req = api
                .request(
                    Method::POST,
                    &format!("/api/client/servers/{id}/files/write"),
                    Some(content.into_bytes()),
                )?
                .query("file", &path)
                .header(CONTENT_TYPE, "text/plain")?;
            api.run(req)
        }
        FilesCommands::Create { id, path } => {
            let req = api
                .request(Method::POST, &format!("/api/client/servers/{id}/files/write"), None)?
                .query("file", &path)
                .header(CONTENT_TYPE, "text/plain")?;
            api.run(req)
        }
        FilesCommands::Compress { id, files, root } => {
            let body = json_body(json!({"root": root, "files": files}))?;
            api.item(api.request(Method::POST, &format!("/api/client/servers/{id}/files/compress"), body)?)
        }
        FilesCommands::Decompress { id, name, root } => {
            let body = json_body(json!({"root": root, "file": name}))?;
            api.run(api.request(
                Method::POST,
                &format!("/api/client/servers/{id}/files/decompress"),
                body,
            )?)
        }
        FilesCommands::Delete { id, files, root } => {
            let count = files.len();
            let body = json_body(json!({"root": root, "files": files}))?;
            api.run(api.request(Method::POST, &format!("/api/client/servers/{id}/files/delete"), body)?)?;
            api.ctx().log().info(&format!("deleted {count} file(s)"));
            Ok(())
        }
        FilesCommands::Mkdir { id, name, root } => {
            let body = json_body(json!({"root": root, "name": name}))?;
            api.run(api.request(
                Method::POST,
                &format!("/api/client/servers/{id}/files/create-folder"),
                body,
            )?)
        }
        FilesCommands::Chmod {
            id,
            name,
            mode,
            root,
        } => {
            let body = json_body(json!({"root": root, "files": [{"file": name, "mode": mode}]}))?;
            api.run(api.request(Method::POST, &format!("/api/client/servers/{id}/files/chmod"), body)?)
        }
        FilesCommands::Pull {
            id,
            url,
            dest,
            name,
            use_header,
            foreground,
        } => {
            let source = Url::parse(&url).with_context(|| format!("invalid url '{url}'"))?;
            let mut info = json!({
                "url": source.as_str(),
                "use_header": use_header,
                "foreground": foreground,
            });
            if let Some(dest) = dest {
                info["directory"] = Value::String(dest);
            }
            if let Some(name) = name {
                info["filename"] = Value::String(name);
            }

            api.run(api.request(
                Method::POST,
                &format!("/api/client/servers/{id}/files/pull"),
                json_body(info)?,
            )?)
        }
        FilesCommands::Upload {
            id,
            files,
            dest,
            url_only,
        } => upload(api, &id, &files, dest, url_only),
    }
}

fn fetch_listing(api: &Api<'_>, id: &str, root: &str) -> Result<Vec<u8>> {
    let req = api
        .request(Method::GET, &format!("/api/client/servers/{id}/files/list"), None)?
        .query("directory", root);
    Ok(api.send(req)?.into_bytes())
}

fn is_directory(entry: &Value) -> bool {
    entry.pointer("/attributes/mimetype").and_then(Value::as_str) == Some(DIRECTORY_MIME)
}

/// Drops listing entries that fail `keep`, leaving the envelope intact.
fn retain(listing: Vec<u8>, keep: impl Fn(&Value) -> bool) -> Result<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(&listing).context("failed to parse response")?;
    if let Some(data) = value.get_mut("data").and_then(Value::as_array_mut) {
        data.retain(|entry| keep(entry));
    }
    Ok(serde_json::to_vec(&value)?)
}

fn download(
    api: &Api<'_>,
    id: &str,
    path: &str,
    dest: Option<PathBuf>,
    url_only: bool,
    force: bool,
) -> Result<()> {
    let signed_url = || -> Result<String> {
        let req = api
            .request(Method::GET, &format!("/api/client/servers/{id}/files/download"), None)?
            .query("file", path);
        api.signed_url(req)
    };

    if url_only {
        return api.ctx().write(signed_url()?.as_bytes());
    }

    let dest = match dest {
        Some(dest) => dest,
        None => Path::new(path)
            .file_name()
            .map(PathBuf::from)
            .with_context(|| format!("cannot derive a file name from '{path}'; pass --dest"))?,
    };

    if !force && dest.exists() {
        bail!(
            "destination {} already exists (use --force to overwrite)",
            dest.display()
        );
    }

    let url = signed_url()?;
    let req = api
        .request_url(Method::GET, &url, None)?
        .header(ACCEPT, "application/octet-stream")?;
    let buf = api.send(req)?.into_bytes();

    api.ctx().log().debug("attempting file write");
    write_file(&dest, &buf, force)?;
    api.ctx()
        .log()
        .info(&format!("downloaded {} bytes to {}", buf.len(), dest.display()));
    Ok(())
}

fn write_file(dest: &Path, buf: &[u8], force: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options
        .open(dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    file.write_all(buf)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(())
}

fn upload(
    api: &Api<'_>,
    id: &str,
    files: &[PathBuf],
    dest: Option<String>,
    url_only: bool,
) -> Result<()> {
    if files.is_empty() && !url_only {
        bail!("at least one file must be specified to upload");
    }

    let req = api.request(Method::GET, &format!("/api/client/servers/{id}/files/upload"), None)?;
    let url = api.signed_url(req)?;

    if url_only {
        return api.ctx().write(url.as_bytes());
    }

    let log = api.ctx().log();
    let mut form = Form::new();
    let mut count = 0usize;

    for path in files {
        match fs::metadata(path) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log.warn(&format!("'{}' does not exist, skipping", path.display()));
                continue;
            }
            Err(_) => {
                log.warn(&format!("'{}' raised an unexpected error, skipping", path.display()));
                continue;
            }
            Ok(meta) if meta.is_dir() => {
                log.warn(&format!("'{}' is a directory, skipping", path.display()));
                continue;
            }
            Ok(_) => {}
        }

        let Ok(buf) = fs::read(path) else {
            log.warn(&format!("could not open '{}', skipping", path.display()));
            continue;
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        form = form.part("files", Part::bytes(buf).file_name(name));
        count += 1;
    }

    if count == 0 {
        bail!("no files found to upload");
    }

    let mut req = api.request_url(Method::POST, &url, None)?;
    if let Some(dest) = dest {
        req = req.query("directory", &dest);
    }
    api.run(req.form(form))?;
    log.info(&format!("uploaded {count} file(s)"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{ctx, ctx_with, compact};
    use crate::config::ScopeKind;
    use crate::logger::Level;
    use httpmock::prelude::*;

    const LISTING: &str = r#"{"object":"list","data":[
        {"object":"file_object","attributes":{"name":"plugins","mimetype":"inode/directory","is_file":false}},
        {"object":"file_object","attributes":{"name":"server.properties","mimetype":"text/plain","is_file":true}}
    ]}"#;

    fn listing_mock(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/client/servers/abc/files/list")
                .query_param("directory", "/");
            then.status(200).body(LISTING);
        });
    }

    #[test]
    fn list_can_keep_only_directories() {
        let server = MockServer::start();
        listing_mock(&server);

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::List {
                id: "abc".into(),
                root: "/".into(),
                dir_only: true,
                file_only: false,
            },
        )
        .unwrap();

        assert_eq!(
            out.text(),
            "[{\"name\":\"plugins\",\"mimetype\":\"inode/directory\",\"is_file\":false}]\n"
        );
    }

    #[test]
    fn info_finds_entry_by_name() {
        let server = MockServer::start();
        listing_mock(&server);

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Info {
                id: "abc".into(),
                name: "server.properties".into(),
                root: "/".into(),
            },
        )
        .unwrap();
        assert!(out.text().starts_with("{\"name\":\"server.properties\""));

        let err = handle(
            &api,
            FilesCommands::Info {
                id: "abc".into(),
                name: "missing.txt".into(),
                root: "/".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn contents_are_requested_as_plain_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/client/servers/abc/files/contents")
                .query_param("file", "/server.properties")
                .header("accept", "text/plain");
            then.status(200).body("motd=hello\n");
        });

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Contents {
                id: "abc".into(),
                path: "/server.properties".into(),
            },
        )
        .unwrap();

        mock.assert();
        assert_eq!(out.text(), "motd=hello\n");
    }

    #[test]
    fn write_sends_plain_text_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/client/servers/abc/files/write")
                .query_param("file", "/eula.txt")
                .header("content-type", "text/plain")
                .body("eula=true");
            then.status(204);
        });

        let (ctx, _) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Write {
                id: "abc".into(),
                path: "/eula.txt".into(),
                content: "eula=true".into(),
            },
        )
        .unwrap();
        mock.assert();
    }

    #[test]
    fn download_follows_signed_url_and_refuses_overwrite() {
        let panel = MockServer::start();
        let node = MockServer::start();

        let signed = node.url("/download/file?token=abc");
        panel.mock(|when, then| {
            when.method(GET)
                .path("/api/client/servers/abc/files/download")
                .query_param("file", "/logs/latest.log");
            then.status(200).json_body(json!({
                "object": "signed_url",
                "attributes": {"url": signed}
            }));
        });
        let fetch = node.mock(|when, then| {
            when.method(GET)
                .path("/download/file")
                .query_param("token", "abc")
                .header("accept", "application/octet-stream");
            then.status(200).body("log line\n");
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("latest.log");

        let (ctx, _) = ctx(&panel);
        let api = ctx.api(ScopeKind::Client).unwrap();
        let cmd = || FilesCommands::Download {
            id: "abc".into(),
            path: "/logs/latest.log".into(),
            dest: Some(dest.clone()),
            url_only: false,
            force: false,
        };

        handle(&api, cmd()).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "log line\n");
        fetch.assert();

        let err = handle(&api, cmd()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        fetch.assert_calls(1);
    }

    #[test]
    fn download_url_only_prints_the_link() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client/servers/abc/files/download");
            then.status(200).json_body(json!({
                "object": "signed_url",
                "attributes": {"url": "https://node.test/download/file?token=xyz"}
            }));
        });

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Download {
                id: "abc".into(),
                path: "/world.zip".into(),
                dest: None,
                url_only: true,
                force: false,
            },
        )
        .unwrap();
        assert_eq!(out.text(), "https://node.test/download/file?token=xyz\n");
    }

    #[test]
    fn download_url_only_needs_no_file_name() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/client/servers/abc/files/download")
                .query_param("file", "/");
            then.status(200).json_body(json!({
                "object": "signed_url",
                "attributes": {"url": "https://node.test/download/file?token=root"}
            }));
        });

        let (ctx, out) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Download {
                id: "abc".into(),
                path: "/".into(),
                dest: None,
                url_only: true,
                force: false,
            },
        )
        .unwrap();
        assert_eq!(out.text(), "https://node.test/download/file?token=root\n");

        let err = handle(
            &api,
            FilesCommands::Download {
                id: "abc".into(),
                path: "/".into(),
                dest: None,
                url_only: false,
                force: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot derive a file name"));
    }

    #[test]
    fn upload_skips_missing_paths_and_directories() {
        let panel = MockServer::start();
        let node = MockServer::start();

        let signed = node.url("/upload/file?token=abc");
        panel.mock(|when, then| {
            when.method(GET).path("/api/client/servers/abc/files/upload");
            then.status(200).json_body(json!({
                "object": "signed_url",
                "attributes": {"url": signed}
            }));
        });
        let receive = node.mock(|when, then| {
            when.method(POST)
                .path("/upload/file")
                .query_param("token", "abc")
                .query_param("directory", "/plugins");
            then.status(200);
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let plugin = dir.path().join("plugin.jar");
        fs::write(&plugin, b"jar").expect("write");

        let (ctx, _, log) = ctx_with(&panel, compact());
        let api = ctx.api(ScopeKind::Client).unwrap();
        handle(
            &api,
            FilesCommands::Upload {
                id: "abc".into(),
                files: vec![plugin, dir.path().join("missing.jar"), dir.path().to_path_buf()],
                dest: Some("/plugins".into()),
                url_only: false,
            },
        )
        .unwrap();

        receive.assert();
        let warnings: Vec<String> = log
            .lines()
            .into_iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, line)| line)
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("does not exist"));
        assert!(warnings[1].contains("is a directory"));
    }

    #[test]
    fn upload_without_usable_files_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/client/servers/abc/files/upload");
            then.status(200).json_body(json!({
                "object": "signed_url",
                "attributes": {"url": "https://node.test/upload/file"}
            }));
        });

        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _) = ctx(&server);
        let api = ctx.api(ScopeKind::Client).unwrap();
        let err = handle(
            &api,
            FilesCommands::Upload {
                id: "abc".into(),
                files: vec![dir.path().join("nope")],
                dest: None,
                url_only: false,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("no files found"));
    }
}
