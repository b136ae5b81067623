use std::fmt::Write as _;

use folio_core::render::escape_html;
use folio_core::{Page, PageMode, Route};

pub fn render(page: &Page) -> String {
    let mut out = String::with_capacity(page.body_html.len() + 2048);
    let title = escape_html(&page.title);
    let _ = write!(
        out,
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} - folio</title>\n\
         <link rel=\"stylesheet\" href=\"/_assets/folio.css\">\n</head>\n\
         <body class=\"mode-{}\">\n",
        mode_name(page.mode)
    );
    render_topbar(&mut out, page);

    out.push_str("<main>\n");
    let _ = writeln!(
        out,
        "<h1 class=\"page-title\"><span class=\"icon\" aria-hidden=\"true\">{}</span>{title}</h1>",
        page.icon.glyph()
    );
    render_actions(&mut out, page);

    match page.mode {
        PageMode::Error => render_error(&mut out, page),
        PageMode::Edit => render_editor(&mut out, page),
        _ => {
            out.push_str("<article class=\"content\">\n");
            out.push_str(&page.body_html);
            out.push_str("\n</article>\n");
        }
    }
    out.push_str("</main>\n");

    if let Some(modified) = page.modified {
        let _ = writeln!(
            out,
            "<footer>Last modified {}</footer>",
            modified.format("%Y-%m-%d %H:%M UTC")
        );
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn render_topbar(out: &mut String, page: &Page) {
    out.push_str("<header class=\"topbar\">\n<nav class=\"breadcrumb\"><a href=\"/\">folio</a>");
    let mut trail = Route::root();
    for segment in page.route.segments() {
        let Ok(next) = trail.join(segment) else {
            break;
        };
        trail = next;
        let _ = write!(
            out,
            "<span class=\"sep\">/</span><a href=\"{}\">{}</a>",
            escape_html(&trail.href(None)),
            escape_html(segment)
        );
    }
    out.push_str("</nav>\n");
    let query = page.search_query.as_deref().map(escape_html).unwrap_or_default();
    let _ = writeln!(
        out,
        "<form class=\"search\" method=\"get\" action=\"/\">\
         <input type=\"search\" name=\"search\" value=\"{query}\" placeholder=\"Search documents\" aria-label=\"Search\">\
         </form>\n</header>"
    );
}

fn render_actions(out: &mut String, page: &Page) {
    let links: Vec<(&str, String)> = match page.mode {
        PageMode::View => vec![
            ("Edit", page.route.href(Some("edit=1"))),
            ("Raw", page.route.href(Some("raw=1"))),
        ],
        PageMode::Edit => vec![("Cancel", page.route.href(None))],
        PageMode::Media | PageMode::Source => vec![("Raw", page.route.href(Some("raw=1")))],
        PageMode::Search | PageMode::Error => Vec::new(),
    };
    if links.is_empty() {
        return;
    }
    out.push_str("<nav class=\"actions\">");
    for (label, target) in links {
        let _ = write!(out, "<a href=\"{}\">{label}</a>", escape_html(&target));
    }
    out.push_str("</nav>\n");
}

fn render_editor(out: &mut String, page: &Page) {
    let text = page.source_text.as_deref().unwrap_or_default();
    let _ = writeln!(
        out,
        "<form class=\"editor\" method=\"post\" action=\"{}\">\n\
         <textarea name=\"content\" spellcheck=\"false\" autofocus>{}</textarea>\n\
         <button type=\"submit\">Save</button>\n</form>",
        escape_html(&page.route.href(None)),
        escape_html(text)
    );
}

fn render_error(out: &mut String, page: &Page) {
    out.push_str("<section class=\"error-panel\">\n");
    if let Some(error) = &page.error {
        let _ = writeln!(out, "<p class=\"code\">{}</p>", error.code());
    }
    out.push_str(&page.body_html);
    if !page.hints.is_empty() {
        out.push_str("\n<ul class=\"hints\">");
        for hint in &page.hints {
            let _ = write!(
                out,
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&hint.href),
                escape_html(&hint.label)
            );
        }
        out.push_str("</ul>");
    }
    out.push_str("\n</section>\n");
}

const fn mode_name(mode: PageMode) -> &'static str {
    match mode {
        PageMode::View => "view",
        PageMode::Edit => "edit",
        PageMode::Media => "media",
        PageMode::Source => "source",
        PageMode::Search => "search",
        PageMode::Error => "error",
    }
}
