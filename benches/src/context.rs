//! Randomly generated page models and overlays for the page template.

use rand::distributions::Alphanumeric;
use rand::Rng;
use trellis::{to_value, Map, Value};

/// The model a page is rendered with, available as `model`.
#[derive(serde::Serialize)]
pub struct Page {
    pub title: String,
    pub content: String,
    pub menu: Vec<MenuItem>,
}

#[derive(serde::Serialize)]
pub struct MenuItem {
    pub title: String,
    pub link: String,
    pub hidden: bool,
}

fn word(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A page with `n` menu items, roughly one in five hidden.
pub fn page(n: usize) -> Value {
    let mut rng = rand::thread_rng();
    let menu = (0..n)
        .map(|_| {
            let title = word(&mut rng, 12);
            MenuItem {
                link: format!("/{}/", title.to_lowercase()),
                title,
                hidden: rng.gen_ratio(1, 5),
            }
        })
        .collect();
    let page = Page {
        title: word(&mut rng, 20),
        content: format!("<p>{}</p>", word(&mut rng, 400)),
        menu,
    };
    to_value(page).unwrap()
}

/// The top level variables a host view adds next to the model.
pub fn overlay() -> Map<String, Value> {
    let mut overlay = Map::new();
    overlay.insert(String::from("site_name"), Value::from("Bench Site"));
    overlay
}
