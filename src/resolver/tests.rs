use super::*;
use std::fs;
use tempfile::TempDir;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "").unwrap();
}

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = paths::normalize(temp_dir.path());
    (temp_dir, root)
}

fn config() -> ProjectConfig {
    ProjectConfig::default().with_excluded_folders(["node_modules"])
}

fn set(paths: &[PathBuf]) -> BTreeSet<PathBuf> {
    paths.iter().cloned().collect()
}

#[test]
fn test_alias_resolution() {
    let (_tmp, proj) = setup();
    touch(&proj.join("components/foo.js"));

    let config = config().with_alias("components", proj.join("components/"));
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("components/foo", &proj.join("src/app.js"));
    assert_eq!(resolved, set(&[proj.join("components/foo.js")]));
}

#[test]
fn test_alias_requires_segment_boundary() {
    let (_tmp, proj) = setup();
    let config = config().with_alias("lib", proj.join("lib"));
    let resolver = PathResolver::new(&config);

    assert_eq!(resolver.expand_alias("lib"), Some(proj.join("lib")));
    assert_eq!(resolver.expand_alias("lib/x"), Some(proj.join("lib/x")));
    assert_eq!(resolver.expand_alias("library/x"), None);
}

#[test]
fn test_longest_alias_wins() {
    let (_tmp, proj) = setup();
    let config = config()
        .with_alias("app", proj.join("app"))
        .with_alias("app/widgets", proj.join("shared/widgets"));
    let resolver = PathResolver::new(&config);

    assert_eq!(
        resolver.expand_alias("app/widgets/button"),
        Some(proj.join("shared/widgets/button"))
    );
    assert_eq!(
        resolver.expand_alias("app/models/user"),
        Some(proj.join("app/models/user"))
    );
}

#[test]
fn test_alias_with_trailing_slash_is_plain_prefix() {
    let (_tmp, proj) = setup();
    touch(&proj.join("src/store.js"));
    let config = config().with_alias("@/", proj.join("src"));
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("@/store", &proj.join("src/app.js"));
    assert_eq!(resolved, set(&[proj.join("src/store.js")]));
}

#[test]
fn test_directory_expansion() {
    let (_tmp, proj) = setup();
    touch(&proj.join("my/path/a.js"));
    touch(&proj.join("my/path/b.coffee"));
    touch(&proj.join("my/path/readme.md"));

    let config = config().with_roots([proj.clone()]);
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("my/path", &proj.join("main.js"));
    assert_eq!(
        resolved,
        set(&[proj.join("my/path/a.js"), proj.join("my/path/b.coffee")])
    );
}

#[test]
fn test_directory_expansion_is_recursive_and_skips_excluded() {
    let (_tmp, proj) = setup();
    touch(&proj.join("lib/a.js"));
    touch(&proj.join("lib/deep/er/b.jsx"));
    touch(&proj.join("lib/node_modules/dep/index.js"));
    touch(&proj.join("lib/.hidden/c.js"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("./lib", &proj.join("main.js"));
    assert_eq!(
        resolved,
        set(&[proj.join("lib/a.js"), proj.join("lib/deep/er/b.jsx")])
    );
}

#[test]
fn test_extensionless_basename_expansion() {
    let (_tmp, proj) = setup();
    touch(&proj.join("my/component.js"));
    touch(&proj.join("my/component-extra.js"));

    let config = config().with_roots([proj.clone()]);
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("my/component", &proj.join("main.js"));
    assert_eq!(resolved, set(&[proj.join("my/component.js")]));
}

#[test]
fn test_basename_expansion_with_several_extensions() {
    let (_tmp, proj) = setup();
    touch(&proj.join("view.js"));
    touch(&proj.join("view.coffee"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("./view", &proj.join("main.js"));
    assert_eq!(
        resolved,
        set(&[proj.join("view.coffee"), proj.join("view.js")])
    );
}

#[test]
fn test_directory_and_file_both_included() {
    let (_tmp, proj) = setup();
    touch(&proj.join("utils.js"));
    touch(&proj.join("utils/strings.js"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("./utils", &proj.join("main.js"));
    assert_eq!(
        resolved,
        set(&[proj.join("utils.js"), proj.join("utils/strings.js")])
    );
}

#[test]
fn test_root_fallback_ordering() {
    let (_tmp, base) = setup();
    let r1 = base.join("r1");
    let r2 = base.join("r2");
    fs::create_dir_all(&r1).unwrap();
    touch(&r2.join("foo/bar.js"));

    let config = config().with_roots([r1.clone(), r2.clone()]);
    let resolver = PathResolver::new(&config);
    let importer = base.join("src/main.js");

    assert_eq!(
        resolver.resolve("foo/bar.js", &importer),
        set(&[r2.join("foo/bar.js")])
    );

    // present under both roots: first root wins
    touch(&r1.join("foo/bar.js"));
    assert_eq!(
        resolver.resolve("foo/bar.js", &importer),
        set(&[r1.join("foo/bar.js")])
    );
}

#[test]
fn test_relative_resolution_with_parent_dirs() {
    let (_tmp, proj) = setup();
    touch(&proj.join("lib/util.js"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("../lib/util", &proj.join("src/app/main.js"));
    assert!(resolved.is_empty());

    let resolved = resolver.resolve("../../lib/util", &proj.join("src/app/main.js"));
    assert_eq!(resolved, set(&[proj.join("lib/util.js")]));
}

#[test]
fn test_recognized_extension_resolves_to_itself() {
    let (_tmp, proj) = setup();
    touch(&proj.join("plain.js"));
    touch(&proj.join("plain.js.js"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let resolved = resolver.resolve("./plain.js", &proj.join("main.js"));
    assert_eq!(resolved, set(&[proj.join("plain.js")]));
}

#[test]
fn test_absolute_specifier() {
    let (_tmp, proj) = setup();
    touch(&proj.join("abs.js"));

    let config = config();
    let resolver = PathResolver::new(&config);

    let specifier = proj.join("abs").to_string_lossy().into_owned();
    let resolved = resolver.resolve(&specifier, Path::new("/elsewhere/main.js"));
    assert_eq!(resolved, set(&[proj.join("abs.js")]));
}

#[test]
fn test_unresolvable_specifiers_are_empty() {
    let (_tmp, proj) = setup();
    let config = config().with_roots([proj.clone()]);
    let resolver = PathResolver::new(&config);
    let importer = proj.join("main.js");

    assert!(resolver.resolve("./missing", &importer).is_empty());
    assert!(resolver.resolve("lodash", &importer).is_empty());
    assert!(resolver.resolve("", &importer).is_empty());
    assert!(resolver.resolve("   ", &importer).is_empty());
    assert!(resolver.resolve("https://cdn.example.com/x.js", &importer).is_empty());
    assert!(resolver.resolve("./locale/${lang}", &importer).is_empty());
}

#[test]
fn test_unrecognized_extension_not_resolved() {
    let (_tmp, proj) = setup();
    touch(&proj.join("styles.css"));

    let config = config();
    let resolver = PathResolver::new(&config);

    assert!(resolver.resolve("./styles.css", &proj.join("main.js")).is_empty());
}
