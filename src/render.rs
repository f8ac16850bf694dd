//! HTML page rendering.
//!
//! Pages are static templates under `templates/` with `{{PLACEHOLDER}}`
//! markers. Every user- or provider-supplied string goes through [`escape`],
//! which also neutralizes `{` so substituted text can never form a marker.

use std::fmt::Write;

use crate::crud::CrudPage;
use crate::flow::FormState;
use crate::provider::User;

const LAYOUT_TEMPLATE: &str = include_str!("../templates/layout.html");
const SIGN_UP_TEMPLATE: &str = include_str!("../templates/signup.html");
const SIGN_IN_TEMPLATE: &str = include_str!("../templates/signin.html");
const CRUD_TEMPLATE: &str = include_str!("../templates/crud.html");
const LOADING_TEMPLATE: &str = include_str!("../templates/loading.html");

/// How often the loading placeholder reloads itself.
pub const LOADING_REFRESH_SECS: u64 = 1;

#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, head: &str, body: &str) -> String {
    LAYOUT_TEMPLATE
        .replace("{{TITLE}}", title)
        .replace("{{HEAD}}", head)
        .replace("{{BODY}}", body)
}

fn disabled(loading: bool) -> &'static str {
    if loading { "disabled" } else { "" }
}

fn messages(form: &FormState) -> String {
    let mut out = String::new();
    if let Some(error) = &form.error {
        let _ = write!(out, r#"<p class="error" role="alert">{}</p>"#, escape(error));
    }
    if let Some(notice) = &form.notice {
        let _ = write!(out, r#"<p class="notice" role="status">{}</p>"#, escape(notice));
    }
    out
}

#[must_use]
pub fn sign_up_page(form: &FormState, email: &str) -> String {
    let body = SIGN_UP_TEMPLATE
        .replace("{{DISABLED}}", disabled(form.loading))
        .replace("{{BUTTON}}", if form.loading { "Creating…" } else { "Sign up" })
        .replace("{{MESSAGES}}", &messages(form))
        .replace("{{EMAIL}}", &escape(email));
    layout("Create your account", "", &body)
}

#[must_use]
pub fn sign_in_page(form: &FormState, email: &str) -> String {
    let body = SIGN_IN_TEMPLATE
        .replace("{{DISABLED}}", disabled(form.loading))
        .replace("{{BUTTON}}", if form.loading { "Signing in…" } else { "Sign in" })
        .replace("{{MESSAGES}}", &messages(form))
        .replace("{{EMAIL}}", &escape(email));
    layout("Sign in", "", &body)
}

/// Neutral placeholder shown while the session is still resolving.
#[must_use]
pub fn loading_page() -> String {
    let head = format!(r#"<meta http-equiv="refresh" content="{LOADING_REFRESH_SECS}">"#);
    layout("Loading", &head, LOADING_TEMPLATE)
}

#[must_use]
pub fn crud_page(page: &CrudPage, user: &User) -> String {
    let form = &page.form;
    let button = if page.loading {
        "Saving..."
    } else if form.editing.is_some() {
        "Update User"
    } else {
        "Add User"
    };
    let cancel = if form.editing.is_some() {
        format!(
            r#"<form method="post" action="/crud/cancel"><button {}>Cancel</button></form>"#,
            disabled(page.loading)
        )
    } else {
        String::new()
    };

    let mut rows = String::new();
    for row in &page.rows {
        let _ = write!(
            rows,
            r#"    <li>
      <div><p class="name">{name}</p><p>{comments}</p><p class="cgpa">CGPA: {cgpa}</p></div>
      <form method="post" action="/crud/edit"><input type="hidden" name="id" value="{id}"><button>Edit</button></form>
      <form method="post" action="/crud/{id}/delete" onsubmit="return confirm('Are you sure you want to delete this user?')"><button>Delete</button></form>
    </li>
"#,
            id = row.id,
            name = escape(&row.name),
            comments = escape(&row.comments),
            cgpa = row.cgpa,
        );
    }

    let body = CRUD_TEMPLATE
        .replace("{{DISABLED}}", disabled(page.loading))
        .replace("{{BUTTON}}", button)
        .replace("{{CANCEL}}", &cancel)
        .replace("{{ROWS}}", &rows)
        .replace("{{USER}}", &escape(&user.label()))
        .replace("{{NAME}}", &escape(&form.name))
        .replace("{{COMMENTS}}", &escape(&form.comments))
        .replace("{{CGPA}}", &escape(&form.cgpa));
    layout("CRUD App", "", &body)
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
