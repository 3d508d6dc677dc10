//! Login form and admin panel markup.

use crate::catalog::PhotoRecord;

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
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
<title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(title),
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let error = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();

    layout(
        "Admin login",
        &format!(
            r#"<h1>Admin login</h1>
{error}
<form method="post" action="/login">
  <label>Username <input type="text" name="username" required></label>
  <label>Password <input type="password" name="password" required></label>
  <button type="submit">Log in</button>
</form>"#
        ),
    )
}

pub fn admin_page(photos: &[PhotoRecord]) -> String {
    let mut rows = String::new();
    for photo in photos {
        let image_path = escape_html(&photo.image_path);
        let caption = escape_html(&photo.caption);
        rows.push_str(&format!(
            r#"<li>
  <img src="/static/{image_path}" alt="{caption}" width="200">
  <form method="post" action="/admin/edit/{id}">
    <input type="text" name="caption" value="{caption}" required>
    <button type="submit">Save caption</button>
  </form>
  <form method="post" action="/admin/delete/{id}">
    <button type="submit">Delete</button>
  </form>
</li>
"#,
            id = photo.id,
        ));
    }

    layout(
        "Admin panel",
        &format!(
            r#"<h1>Admin panel</h1>
<p><a href="/logout">Log out</a></p>
<form method="post" action="/admin/upload" enctype="multipart/form-data">
  <input type="file" name="photo" accept=".png,.jpg,.jpeg,.gif" required>
  <input type="text" name="caption" placeholder="Caption" required>
  <button type="submit">Upload</button>
</form>
<p>{count} photo(s)</p>
<ul>
{rows}</ul>"#,
            count = photos.len(),
        ),
    )
}
