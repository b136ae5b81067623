pub const FOLIO_CSS: &str = r#":root {
  --fg: #1f2328;
  --muted: #656d76;
  --bg: #ffffff;
  --panel: #f6f8fa;
  --border: #d0d7de;
  --accent: #0969da;
  --danger: #cf222e;
  font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
  color: var(--fg);
  background: var(--bg);
}

body {
  margin: 0;
}

.topbar {
  display: flex;
  align-items: center;
  justify-content: space-between;
  gap: 1rem;
  padding: 0.6rem 1.5rem;
  border-bottom: 1px solid var(--border);
  background: var(--panel);
}

.breadcrumb a {
  color: var(--accent);
  text-decoration: none;
}

.breadcrumb .sep {
  color: var(--muted);
  margin: 0 0.3rem;
}

.search input {
  width: 16rem;
  padding: 0.3rem 0.5rem;
  border: 1px solid var(--border);
  border-radius: 6px;
}

main {
  max-width: 60rem;
  margin: 0 auto;
  padding: 1.5rem;
}

h1.page-title .icon {
  margin-right: 0.4rem;
}

.actions {
  display: flex;
  gap: 0.8rem;
  margin-bottom: 1rem;
}

.actions a,
.hints a {
  color: var(--accent);
}

.error-panel {
  border: 1px solid var(--danger);
  border-radius: 6px;
  padding: 0.8rem 1rem;
}

.error-panel .code {
  color: var(--danger);
  font-family: ui-monospace, monospace;
  font-size: 0.85rem;
}

.editor textarea {
  width: 100%;
  min-height: 28rem;
  font-family: ui-monospace, monospace;
  font-size: 0.9rem;
  box-sizing: border-box;
}

.editor button {
  margin-top: 0.6rem;
  padding: 0.4rem 1.2rem;
}

pre.source {
  background: var(--panel);
  padding: 1rem;
  overflow-x: auto;
}

figure.media img {
  max-width: 100%;
}

.results li {
  margin-bottom: 0.8rem;
}

.results .route,
footer {
  color: var(--muted);
  font-size: 0.85rem;
}

.notice {
  color: var(--muted);
  font-style: italic;
}

footer {
  max-width: 60rem;
  margin: 0 auto;
  padding: 0 1.5rem 1.5rem;
}
"#;
