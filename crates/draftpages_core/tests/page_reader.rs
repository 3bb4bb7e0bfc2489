mod common;

use common::{admin, contributor, editor, guest, regions, tree_page, Stack};
use draftpages_core::capability::actor::Actor;
use draftpages_core::db::open_db_in_memory;
use draftpages_core::model::page::Page;
use draftpages_core::repo::criteria::{Criteria, PageField};
use draftpages_core::repo::page_repo::{Projection, RegionProjection};
use draftpages_core::service::loaders::{RegionLoader, RegionLoaders};
use draftpages_core::service::overlay_store::OverlayRegionStore;
use draftpages_core::service::page_reader::{
    AreasSelector, BoolFilter, CompositePageReader, PageQueryOptions,
};
use draftpages_core::service::DraftError;
use serde_json::{json, Value};

fn seed_home(stack: &Stack<'_>) {
    stack.seed(&tree_page(
        "/home",
        "Home",
        json!({
            "body": { "type": "text", "content": "Welcome" },
            "footer": { "type": "text", "content": "(c) 2024" }
        }),
    ));
    OverlayRegionStore::new(&stack.repo, stack.hooks())
        .put_region(
            &editor(),
            "/home:body",
            json!({ "type": "text", "content": "Welcome back" }),
        )
        .unwrap();
}

fn only(keys: &[&str]) -> AreasSelector {
    AreasSelector::Only(keys.iter().map(|key| key.to_string()).collect())
}

#[test]
fn editors_see_the_merged_overlay() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let results = reader
        .query(&editor(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();

    assert_eq!(results.total, 1);
    let view = &results.pages[0];
    assert!(view.overlay_applied);
    assert!(view.capabilities.can_edit);
    assert!(!view.capabilities.can_admin);
    assert_eq!(view.page.areas["body"]["content"], "Welcome back");
    assert_eq!(view.page.areas["footer"]["content"], "(c) 2024");
    assert!(view.page.draft_areas.as_ref().unwrap().contains_key("body"));
}

#[test]
fn guests_see_canonical_regions_only() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let results = reader
        .query(&guest(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();

    let view = &results.pages[0];
    assert!(!view.overlay_applied);
    assert!(!view.capabilities.can_edit);
    assert_eq!(view.page.areas["body"]["content"], "Welcome");
    assert_eq!(view.page.draft_areas, None);
}

#[test]
fn canonical_only_keeps_the_overlay_beside_published_regions() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let options = PageQueryOptions {
        canonical_only: true,
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&admin(), Criteria::Everything, &options)
        .unwrap();

    let view = &results.pages[0];
    assert!(!view.overlay_applied);
    assert_eq!(view.page.areas["body"]["content"], "Welcome");
    assert_eq!(
        view.page.draft_areas.as_ref().unwrap()["body"]["content"],
        "Welcome back"
    );
}

#[test]
fn areas_only_prunes_after_merging() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let body_only = PageQueryOptions {
        areas: only(&["body"]),
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&editor(), Criteria::Everything, &body_only)
        .unwrap();
    let page = &results.pages[0].page;
    assert_eq!(page.areas.keys().collect::<Vec<_>>(), vec!["body"]);
    assert_eq!(page.areas["body"]["content"], "Welcome back");

    let footer_only = PageQueryOptions {
        areas: only(&["footer"]),
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&editor(), Criteria::Everything, &footer_only)
        .unwrap();
    let page = &results.pages[0].page;
    assert_eq!(page.areas.keys().collect::<Vec<_>>(), vec!["footer"]);
    assert_eq!(page.draft_areas, None);
}

#[test]
fn areas_none_skips_region_loading() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let options = PageQueryOptions {
        areas: AreasSelector::None,
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&guest(), Criteria::Everything, &options)
        .unwrap();
    assert_eq!(results.pages[0].page.slug, "/home");
    assert!(results.pages[0].page.areas.is_empty());
}

#[test]
fn tag_filters_pagination_and_total() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    for (slug, title, tags) in [
        ("/a", "Alpha", vec!["news"]),
        ("/b", "Bravo", vec!["news", "sports"]),
        ("/c", "Charlie", vec!["news"]),
        ("/d", "Delta", vec!["weather"]),
        ("/e", "Echo", vec!["news"]),
    ] {
        let mut page = tree_page(slug, title, json!({}));
        page.tags = tags.into_iter().map(String::from).collect();
        stack.seed(&page);
    }
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let options = PageQueryOptions {
        tags: Some(vec!["news".to_string()]),
        not_tags: Some(vec!["sports".to_string()]),
        skip: Some(1),
        limit: Some(1),
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&guest(), Criteria::Everything, &options)
        .unwrap();
    assert_eq!(results.total, 3);
    let titles: Vec<&str> = results.pages.iter().map(|v| v.page.title.as_str()).collect();
    assert_eq!(titles, vec!["Charlie"]);

    let tags = reader
        .distinct_tags(&guest(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();
    assert_eq!(tags, vec!["news", "sports", "weather"]);
}

#[test]
fn trash_is_hidden_unless_requested() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    stack.seed(&tree_page("/kept", "Kept", json!({})));
    let mut binned = tree_page("/binned", "Binned", json!({}));
    binned.trash = true;
    stack.seed(&binned);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let default = reader
        .query(&admin(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();
    assert_eq!(default.total, 1);

    let trash = PageQueryOptions {
        trash: Some(BoolFilter::Yes),
        ..PageQueryOptions::default()
    };
    let results = reader.query(&admin(), Criteria::Everything, &trash).unwrap();
    assert_eq!(results.pages[0].page.slug, "/binned");
}

#[test]
fn contributors_see_published_and_their_own_pages() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    stack.seed(&tree_page("/public", "Public", json!({})));
    let mut draft = Page::new("/private", "Private");
    draft.editors = vec!["carol".to_string()];
    stack.seed(&draft);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let slugs = |actor: &Actor, editable_only: bool| -> Vec<String> {
        let options = PageQueryOptions {
            editable_only,
            ..PageQueryOptions::default()
        };
        reader
            .query(actor, Criteria::Everything, &options)
            .unwrap()
            .pages
            .into_iter()
            .map(|view| view.page.slug)
            .collect()
    };

    assert_eq!(slugs(&contributor("carol"), false), vec!["/private", "/public"]);
    assert_eq!(slugs(&contributor("carol"), true), vec!["/private"]);
    assert_eq!(slugs(&contributor("dan"), false), vec!["/public"]);
    assert!(slugs(&guest(), true).is_empty());
}

#[test]
fn reserved_props_are_stripped() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    let mut page = tree_page("/props", "Props", json!({}));
    page.props = regions(json!({ "_secret": 1, "color": "red" }));
    stack.seed(&page);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let results = reader
        .query(&guest(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();
    let props = &results.pages[0].page.props;
    assert!(!props.contains_key("_secret"));
    assert_eq!(props["color"], "red");
}

#[test]
fn distinct_respects_permission_scope() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    let mut blog = tree_page("/blog", "Blog", json!({}));
    blog.page_type = Some("blog".to_string());
    stack.seed(&blog);
    let mut hidden = Page::new("/hidden", "Hidden");
    hidden.page_type = Some("landing".to_string());
    stack.seed(&hidden);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let guest_types = reader
        .distinct(
            &guest(),
            Criteria::Everything,
            &PageQueryOptions::default(),
            PageField::PageType,
        )
        .unwrap();
    assert_eq!(guest_types, vec![json!("blog")]);

    let mut admin_types = reader
        .distinct(
            &admin(),
            Criteria::Everything,
            &PageQueryOptions::default(),
            PageField::PageType,
        )
        .unwrap();
    admin_types.sort_by_key(|value| value.to_string());
    assert_eq!(admin_types, vec![json!("blog"), json!("landing")]);
}

struct Highlight;

impl RegionLoader for Highlight {
    fn name(&self) -> &str {
        "highlight"
    }

    fn load_region(
        &self,
        actor: &Actor,
        slug: &str,
        region_key: &str,
        region: &mut Value,
    ) -> Result<(), String> {
        if let Some(object) = region.as_object_mut() {
            object.insert("loaded_for".to_string(), json!(actor.id));
            object.insert("address".to_string(), json!(format!("{slug}:{region_key}")));
        }
        Ok(())
    }
}

struct Failing;

impl RegionLoader for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn load_region(&self, _: &Actor, _: &str, _: &str, _: &mut Value) -> Result<(), String> {
        Err("upstream unavailable".to_string())
    }
}

#[test]
fn loaders_run_over_merged_regions() {
    let conn = open_db_in_memory().unwrap();
    let mut loaders = RegionLoaders::default();
    loaders.register(Highlight);
    let stack = Stack::with_loaders(&conn, loaders);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let results = reader
        .query(&editor(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap();
    let body = &results.pages[0].page.areas["body"];
    assert_eq!(body["content"], "Welcome back");
    assert_eq!(body["loaded_for"], "eve");
    assert_eq!(body["address"], "/home:body");
}

#[test]
fn loader_failure_fails_the_query() {
    let conn = open_db_in_memory().unwrap();
    let mut loaders = RegionLoaders::default();
    loaders.register(Failing);
    let stack = Stack::with_loaders(&conn, loaders);
    seed_home(&stack);
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let err = reader
        .query(&guest(), Criteria::Everything, &PageQueryOptions::default())
        .unwrap_err();
    match err {
        DraftError::Loader(failure) => {
            assert_eq!(failure.loader, "failing");
            assert_eq!(failure.slug, "/home");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn region_projection_fetches_the_same_subset_of_overlay() {
    let conn = open_db_in_memory().unwrap();
    let stack = Stack::new(&conn);
    stack.seed(&tree_page(
        "/home",
        "Home",
        json!({
            "body": { "content": "W", "n": [1, 2] },
            "footer": "F",
            "side": "S"
        }),
    ));
    let store = OverlayRegionStore::new(&stack.repo, stack.hooks());
    store
        .put_region(&editor(), "/home:body", json!({ "content": "W2" }))
        .unwrap();
    store
        .put_region(&editor(), "/home:side", json!({ "content": "S2" }))
        .unwrap();
    let reader = CompositePageReader::new(&stack.repo, stack.hooks());

    let options = PageQueryOptions {
        projection: Projection {
            identity_only: false,
            regions: RegionProjection::Only(
                ["body", "footer"].iter().map(|key| key.to_string()).collect(),
            ),
        },
        ..PageQueryOptions::default()
    };
    let results = reader
        .query(&editor(), Criteria::Everything, &options)
        .unwrap();
    let page = &results.pages[0].page;

    assert_eq!(page.areas.keys().collect::<Vec<_>>(), vec!["body", "footer"]);
    assert_eq!(page.areas["body"]["content"], "W2");
    assert_eq!(page.areas["body"]["n"], json!([1, 2]));
    assert_eq!(page.areas["footer"], "F");
    let overlay = page.draft_areas.as_ref().unwrap();
    assert_eq!(overlay.keys().collect::<Vec<_>>(), vec!["body"]);
    assert!(results.pages[0].overlay_applied);
}
