//! Server-rendered HTML pages
//!
//! Plain forms only. Every value that comes from a backend or the snapshot is escaped.

use imgpress_core::{AccessTier, FolderEntry};

use crate::constants::{AZURE_PATH, AZURE_TIER_PATH, CLOUDINARY_PATH, CLOUDINARY_RELOAD_PATH};

const TIERS: [AccessTier; 4] = [
    AccessTier::Hot,
    AccessTier::Cool,
    AccessTier::Cold,
    AccessTier::Archive,
];

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | imgpress</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="{cloudinary}">Cloudinary</a> | <a href="{azure}">Azure</a></nav>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape_html(title),
        cloudinary = CLOUDINARY_PATH,
        azure = AZURE_PATH,
        body = body,
    )
}

pub fn home_page() -> String {
    layout(
        "Image upload",
        &format!(
            r#"<p>Images are recompressed to JPEG before they are published.</p>
<ul>
<li><a href="{}">Upload to Cloudinary</a></li>
<li><a href="{}">Upload to Azure Blob Storage</a></li>
</ul>"#,
            CLOUDINARY_PATH, AZURE_PATH
        ),
    )
}

pub fn cloudinary_page(folders: &[FolderEntry]) -> String {
    let options: String = folders
        .iter()
        .map(|f| {
            format!(
                r#"<option value="{}">{}</option>"#,
                escape_html(&f.path),
                escape_html(&f.path)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    layout(
        "Cloudinary",
        &format!(
            r#"<form action="{action}" method="post" enctype="multipart/form-data">
<label>Folder
<select name="folder">
<option value="">(root)</option>
{options}
</select>
</label>
<label><input type="checkbox" name="keepFilename" value="true"> Keep file names</label>
<input type="file" name="file" accept="image/png,image/jpeg,image/webp,image/svg+xml" multiple>
<button type="submit">Upload</button>
</form>
<p>{count} folders cached. <a href="{reload}">Reload folders</a></p>"#,
            action = CLOUDINARY_PATH,
            options = options,
            count = folders.len(),
            reload = CLOUDINARY_RELOAD_PATH,
        ),
    )
}

pub fn azure_page(containers: &[String]) -> String {
    let options: String = containers
        .iter()
        .map(|c| format!(r#"<option value="{0}">{0}</option>"#, escape_html(c)))
        .collect::<Vec<_>>()
        .join("\n");

    let tiers: String = TIERS
        .iter()
        .map(|t| format!(r#"<option value="{0}">{0}</option>"#, t))
        .collect::<Vec<_>>()
        .join("\n");

    layout(
        "Azure Blob Storage",
        &format!(
            r#"<form action="{upload}" method="post" enctype="multipart/form-data">
<label>Container <input name="container" list="containers" required></label>
<datalist id="containers">
{options}
</datalist>
<input type="file" name="file" accept="image/png,image/jpeg,image/webp,image/svg+xml" multiple>
<button type="submit">Upload</button>
</form>
<h2>Access tier</h2>
<form action="{tier}" method="post">
<label>Container
<select name="container">
{options}
</select>
</label>
<label>Tier
<select name="tier">
{tiers}
</select>
</label>
<button type="submit">Apply to every blob</button>
</form>"#,
            upload = AZURE_PATH,
            tier = AZURE_TIER_PATH,
            options = options,
            tiers = tiers,
        ),
    )
}
