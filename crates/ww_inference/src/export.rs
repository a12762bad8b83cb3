use std::path::{Path, PathBuf};
use tracing::info;
use ww_core::{BlogPost, Result};

const MAX_SLUG_CHARS: usize = 50;

const STYLE: &str = "\
        body { font-family: Georgia, serif; max-width: 800px; margin: 40px auto; padding: 0 20px; line-height: 1.8; color: #333; }
        h1 { color: #1a5276; font-size: 2em; }
        h2 { color: #2471a3; margin-top: 30px; }
        h3 { color: #2e86c1; }
        blockquote { border-left: 4px solid #2471a3; padding: 10px 20px; margin: 20px 0; background: #eaf2f8; font-style: italic; }
        .lead { font-size: 1.1em; color: #555; }
        .meta { color: #888; font-size: 0.9em; margin-bottom: 20px; }
        .tags { margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; }
        .tag { display: inline-block; background: #2471a3; color: white; padding: 4px 12px; border-radius: 15px; margin: 2px; font-size: 0.85em; }";

/// Lowercase ascii alphanumerics joined by single dashes.
pub fn slugify(headline: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in headline.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug.chars().take(MAX_SLUG_CHARS).collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone page for the post. `content` is already HTML and goes in as is.
pub fn render_html(blog: &BlogPost) -> String {
    let tags: String = blog
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!(r#"<span class="tag">{}</span>"#, escape(t)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="description" content="{meta}">
    <title>{headline}</title>
    <style>
{style}
    </style>
</head>
<body>
    <article>
        <h1>{headline}</h1>
        <div class="meta">
            Published: {date} | WasteWatch
        </div>
        {content}
        <div class="tags">
            <strong>Tags:</strong>
            {tags}
        </div>
    </article>
</body>
</html>
"#,
        meta = escape(&blog.meta_description),
        headline = escape(&blog.headline),
        style = STYLE,
        date = blog.created_at.format("%B %d, %Y"),
        content = blog.content,
        tags = tags,
    )
}

/// Write `<dir>/<slug>.html`, creating `dir` when missing.
pub async fn export_html(blog: &BlogPost, dir: &Path) -> Result<PathBuf> {
    let mut slug = slugify(&blog.headline);
    if slug.is_empty() {
        slug = format!("post-{}", blog.id);
    }
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.html", slug));
    tokio::fs::write(&path, render_html(blog)).await?;
    info!(path = %path.display(), "Exported blog post");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ww_core::BlogDraft;

    fn blog(headline: &str) -> BlogPost {
        let draft = BlogDraft {
            headline: headline.to_string(),
            meta_description: "Beach \"closed\" after spill".to_string(),
            tags: vec!["sewage".to_string(), " ".to_string(), "R&D".to_string()],
            featured_image_prompt: String::new(),
            content: "<p class=\"lead\">It happened.</p>".to_string(),
        };
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let mut post = BlogPost::from_draft(draft, Some(1), created);
        post.id = 9;
        post
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sewage Spill: What It Means!"), "sewage-spill-what-it-means");
        assert_eq!(slugify("  --PFAS  in 2024-- "), "pfas-in-2024");
        assert_eq!(slugify(&"word ".repeat(30)).chars().count(), 50);
        assert_eq!(slugify("¿¡!"), "");
    }

    #[test]
    fn test_render_escapes_metadata_not_body() {
        let html = render_html(&blog("Spill <Update>"));
        assert!(html.contains("<title>Spill &lt;Update&gt;</title>"));
        assert!(html.contains(r#"content="Beach &quot;closed&quot; after spill""#));
        assert!(html.contains("Published: March 05, 2024 | WasteWatch"));
        assert!(html.contains(r#"<p class="lead">It happened.</p>"#));
        assert!(html.contains(r#"<span class="tag">sewage</span><span class="tag">R&amp;D</span>"#));
        assert!(html.contains("font-family: Georgia, serif"));
    }

    #[tokio::test]
    async fn test_export_writes_slug_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("generated_posts");

        let path = export_html(&blog("Bay Sewage Crisis"), &out).await.unwrap();
        assert_eq!(path, out.join("bay-sewage-crisis.html"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));

        let fallback = export_html(&blog("!!!"), &out).await.unwrap();
        assert_eq!(fallback.file_name().unwrap(), "post-9.html");
    }
}
