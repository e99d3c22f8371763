//! Preview server: baked files, blog index pages and on-demand content pages

use anyhow::{Context, Result};
use serde_yaml::Mapping;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cache::RenderCache;
use crate::content::loader::scan_posts;
use crate::content::{
    html_escape, ContentRepository, FrontMatter, MarkdownRenderer, PostInfo, RenderContext,
};
use crate::error::ServerError;
use crate::pagination::{PaginationView, PostData};
use crate::server::{HandlerResult, Request, WebResponse, WebServer};
use crate::Site;

/// Everything the preview handlers share for the lifetime of the server
struct Preview {
    title: String,
    posts: Vec<PostInfo>,
    posts_per_page: usize,
    pages_dir: PathBuf,
    repository: ContentRepository,
    context: RenderContext,
    page_config: Mapping,
    cache: RenderCache,
    renderer: MarkdownRenderer,
}

impl Preview {
    fn new(site: &Site) -> Result<Self> {
        Ok(Self {
            title: site.config.site.title.clone(),
            posts: scan_posts(&site.posts_dir())?,
            posts_per_page: site.config.site.posts_per_page,
            pages_dir: site.pages_dir(),
            repository: ContentRepository::new(),
            context: RenderContext::from_config(&site.config),
            page_config: site.config.page_config(),
            cache: RenderCache::new(&site.cache_dir),
            renderer: MarkdownRenderer::new(),
        })
    }

    /// Blog index page, 1-based. Pages past the end are not found, except an
    /// empty first page.
    fn index(&self, page: usize, response: &mut WebResponse) -> Result<bool> {
        let mut view = PaginationView::new(
            &self.posts,
            &self.repository,
            &self.context,
            &self.page_config,
        );
        let Some(skip) = page.checked_sub(1).and_then(|p| p.checked_mul(self.posts_per_page)) else {
            return Ok(false);
        };
        view.skip(skip)?.limit(self.posts_per_page)?;
        if page > 1 && view.is_empty()? {
            return Ok(false);
        }

        let has_more = view.has_more()?;
        let total = view.total_count()?;
        let html = render_index(&self.title, view.posts()?, page, has_more, total);

        response.add_header("Content-Type", "text/html");
        response.write_all(html.as_bytes())?;
        Ok(true)
    }

    /// A post, found by its URI
    fn post(&self, uri: &str, response: &mut WebResponse) -> Result<bool> {
        let uri = uri.trim_matches('/');
        let Some(info) = self.posts.iter().find(|p| self.context.post_uri(p) == uri) else {
            return Ok(false);
        };
        let Some(date) = info.date() else {
            return Ok(false);
        };

        let item = self.repository.get_or_create(&info.path, uri, date);
        let html = self.cached(&info.path, uri, || {
            let loaded = item.load()?;
            let title = loaded.config.get_str("title").unwrap_or(&info.slug);
            Ok(render_document(title, &loaded.content))
        })?;

        response.add_header("Content-Type", "text/html");
        response.write_all(html.as_bytes())?;
        Ok(true)
    }

    /// A page from the pages directory, `<uri>.md`
    fn page(&self, uri: &str, response: &mut WebResponse) -> Result<bool> {
        let uri = uri.trim_matches('/');
        if uri.is_empty() || uri.split('/').any(|s| s == ".." || s.is_empty()) {
            return Ok(false);
        }
        let source = self.pages_dir.join(format!("{}.md", uri));
        if !source.is_file() {
            return Ok(false);
        }

        let html = self.cached(&source, uri, || {
            let text = fs::read_to_string(&source)
                .with_context(|| format!("Can't read page {:?}", source))?;
            let (config, body) = FrontMatter::parse(&text)
                .with_context(|| format!("Invalid front-matter in {:?}", source))?;
            let (_, full) = MarkdownRenderer::split_abstract(body);
            let title = config.get_str("title").unwrap_or(uri);
            Ok(render_document(title, &self.renderer.render(&full)))
        })?;

        response.add_header("Content-Type", "text/html");
        response.write_all(html.as_bytes())?;
        Ok(true)
    }

    /// Render through the cache, rebuilding when the source is newer
    fn cached<F>(&self, source: &Path, uri: &str, render: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        let extension = Some("html");
        if self.cache.is_expired(source, uri, extension)? {
            tracing::debug!("Rendering {} from {:?}", uri, source);
            let html = render()?;
            self.cache.write(uri, extension, &html)?;
            return Ok(html);
        }
        Ok(self.cache.read_payload(uri, extension)?)
    }
}

fn render_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        body
    )
}

fn render_index(title: &str, posts: &[PostData], page: usize, has_more: bool, total: usize) -> String {
    let mut body = format!("<h1>{}</h1>\n", html_escape(title));
    for post in posts {
        let post_title = post
            .config
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(&post.slug);
        let _ = write!(
            body,
            "<article>\n<h2><a href=\"{}\">{}</a></h2>\n<time datetime=\"{}\">{}</time>\n{}\n",
            post.url,
            html_escape(post_title),
            post.timestamp,
            post.date,
            post.content
        );
        if post.has_more {
            let _ = writeln!(body, "<p><a href=\"{}\">Read more</a></p>", post.url);
        }
        body.push_str("</article>\n");
    }

    body.push_str("<nav>\n");
    if page == 2 {
        body.push_str("<a href=\"/\">Newer posts</a>\n");
    } else if page > 2 {
        let _ = writeln!(body, "<a href=\"/page/{}\">Newer posts</a>", page - 1);
    }
    if has_more {
        let _ = writeln!(body, "<a href=\"/page/{}\">Older posts</a>", page + 1);
    }
    let _ = writeln!(body, "<span>{} posts</span>\n</nav>", total);

    render_document(title, &body)
}

/// Register the preview routes on a server
fn routes(server: &mut WebServer, preview: Rc<Preview>) -> Result<(), ServerError> {
    let index = Rc::clone(&preview);
    server.on("GET", "/", move |_: &Request, response: &mut WebResponse| {
        HandlerResult::from(index.index(1, response))
    })?;

    let paged = Rc::clone(&preview);
    server.on_pattern("GET", r"/page/\d+", move |request: &Request, response: &mut WebResponse| {
        let page = request
            .path()
            .rsplit('/')
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&n| n >= 1);
        match page {
            Some(page) => HandlerResult::from(paged.index(page, response)),
            None => HandlerResult::NotHandled,
        }
    })?;

    let posts = Rc::clone(&preview);
    server.on_pattern("GET", "/.+", move |request: &Request, response: &mut WebResponse| {
        HandlerResult::from(posts.post(request.path(), response))
    })?;

    let pages = preview;
    server.on_pattern("GET", "/.+", move |request: &Request, response: &mut WebResponse| {
        HandlerResult::from(pages.page(request.path(), response))
    })?;
    Ok(())
}

/// Build the preview server for a site
pub fn build(site: &Site) -> Result<WebServer> {
    let mut server = WebServer::new(&site.bake_dir, &site.mime_types_path())?;
    let preview = Rc::new(Preview::new(site)?);
    tracing::info!("Previewing {} posts", preview.posts.len());
    routes(&mut server, preview)?;
    Ok(server)
}

/// Bake, then serve until the process is stopped
pub async fn run(site: &Site, address: &str, port: u16) -> Result<()> {
    site.bake(false)?;
    let server = build(site)?;
    server.run(address, port).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Response;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn site(posts: u32) -> (TempDir, Site) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("_config.yml"),
            "site:\n  title: Test Blog\n  posts_per_page: 2\n",
        )
        .unwrap();
        fs::write(dir.path().join("mime.types"), "text/html html\n").unwrap();

        let posts_dir = dir.path().join("_content/posts");
        fs::create_dir_all(&posts_dir).unwrap();
        for i in 1..=posts {
            fs::write(
                posts_dir.join(format!("2024-03-{:02}_post-{}.md", i, i)),
                format!("---\ntitle: Post {}\n---\nIntro {}\n<!--more-->\nRest {}\n", i, i, i),
            )
            .unwrap();
        }

        let pages_dir = dir.path().join("_content/pages");
        fs::create_dir_all(&pages_dir).unwrap();
        fs::write(pages_dir.join("about.md"), "---\ntitle: About us\n---\n# About\n").unwrap();

        let site = Site::new(dir.path()).unwrap();
        fs::create_dir_all(&site.bake_dir).unwrap();
        (dir, site)
    }

    fn get(server: &WebServer, path: &str) -> Response {
        let line = format!("GET {} HTTP/1.1", path);
        let request = Request::parse(&[line]).unwrap();
        server.process_request(&request).unwrap()
    }

    fn body(response: &Response) -> String {
        String::from_utf8(response.body.clone().unwrap_or_default()).unwrap()
    }

    #[test]
    fn test_index_pages() {
        let (_dir, site) = site(3);
        let server = build(&site).unwrap();

        let first = get(&server, "/");
        assert_eq!(first.status, 200);
        assert_eq!(first.header("Content-Type"), Some("text/html"));
        let html = body(&first);
        assert!(html.contains("<title>Test Blog</title>"));
        assert!(html.contains("Post 3"));
        assert!(html.contains("Post 2"));
        assert!(!html.contains("Post 1<"));
        assert!(html.contains("Intro 3"));
        assert!(!html.contains("Rest 3"));
        assert!(html.contains("href=\"/page/2\""));
        assert!(html.contains("3 posts"));

        let second = body(&get(&server, "/page/2"));
        assert!(second.contains("Post 1"));
        assert!(second.contains("<a href=\"/\">Newer posts</a>"));
        assert!(!second.contains("Older posts"));

        assert_eq!(get(&server, "/page/3").status, 404);
        assert_eq!(get(&server, "/page/0").status, 404);
        assert_eq!(get(&server, "/page/10000000000000000000").status, 404);
        assert_eq!(get(&server, &format!("/page/{}", usize::MAX)).status, 404);
        assert_eq!(get(&server, "/page/99999999999999999999999").status, 404);
    }

    #[test]
    fn test_empty_blog_index() {
        let (_dir, site) = site(0);
        let server = build(&site).unwrap();
        let response = get(&server, "/");
        assert_eq!(response.status, 200);
        assert!(body(&response).contains("0 posts"));
    }

    #[test]
    fn test_post_page() {
        let (_dir, site) = site(2);
        let server = build(&site).unwrap();

        let response = get(&server, "/2024/03/02/post-2");
        assert_eq!(response.status, 200);
        let html = body(&response);
        assert!(html.contains("<title>Post 2</title>"));
        assert!(html.contains("Rest 2"));
        assert!(site.cache_dir.join("2024/03/02/post-2.html").exists());
    }

    #[test]
    fn test_content_page_goes_through_cache() {
        let (dir, site) = site(0);
        let server = build(&site).unwrap();

        let response = get(&server, "/about");
        assert_eq!(response.status, 200);
        assert!(body(&response).contains("<h1>About</h1>"));

        // A cached copy newer than the source is served as is
        let cached = site.cache_dir.join("about.html");
        let header = fs::read_to_string(&cached).unwrap();
        let header = header.lines().next().unwrap();
        fs::write(&cached, format!("{}\n<p>from cache</p>", header)).unwrap();
        let source = dir.path().join("_content/pages/about.md");
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();
        assert_eq!(body(&get(&server, "/about")), "<p>from cache</p>");

        // Touching the source invalidates it
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(std::time::SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert!(body(&get(&server, "/about")).contains("<h1>About</h1>"));
    }

    #[test]
    fn test_unknown_paths() {
        let (_dir, site) = site(1);
        let server = build(&site).unwrap();
        assert_eq!(get(&server, "/nope").status, 404);
        assert_eq!(get(&server, "/nested/../about").status, 404);
    }

    #[test]
    fn test_baked_files_are_served_first() {
        let (_dir, site) = site(1);
        fs::write(site.bake_dir.join("about.html"), "<p>baked</p>").unwrap();
        let server = build(&site).unwrap();
        assert_eq!(body(&get(&server, "/about.html")), "<p>baked</p>");
    }

    #[test]
    fn test_missing_mime_types_is_fatal() {
        let (dir, site) = site(0);
        fs::remove_file(dir.path().join("mime.types")).unwrap();
        assert!(build(&site).is_err());
    }
}
