//! Language and test-file recognition from paths.
//!
//! Everything here works on file names only; nothing is read from disk.

use std::path::Path;

/// Extensions we track, mapped to editor-style language ids.
const LANGUAGES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("jsx", "javascriptreact"),
    ("ts", "typescript"),
    ("tsx", "typescriptreact"),
    ("py", "python"),
    ("java", "java"),
    ("go", "go"),
    ("rb", "ruby"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("hpp", "cpp"),
    ("cs", "csharp"),
    ("php", "php"),
    ("rs", "rust"),
];

/// Returns the language id for a path, or `None` if it is not a tracked
/// source file.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Returns true if the path has a tracked source extension.
pub fn is_source_file(path: &Path) -> bool {
    language_for_path(path).is_some()
}

/// Returns true if the path looks like a test file.
pub fn is_test_file(path: &Path) -> bool {
    if !is_source_file(path) {
        return false;
    }

    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if name.contains(".test.")
        || name.contains(".spec.")
        || name.contains("-test.")
        || name.contains("-spec.")
        || name.starts_with("test_")
        || name.contains("_test.")
    {
        return true;
    }

    path.parent()
        .map(|dir| {
            dir.components().any(|c| {
                let c = c.as_os_str();
                c == "__tests__" || c == "tests"
            })
        })
        .unwrap_or(false)
}

/// File-name prefixes a test for `source` is expected to start with.
///
/// For `src/user.js` this yields `user.test.`, `user.spec.`, `test_user.`
/// and so on.
pub fn test_file_candidates(source: &Path) -> Vec<String> {
    let stem = match source.file_stem().and_then(|s| s.to_str()) {
        Some(s) => s,
        None => return Vec::new(),
    };

    vec![
        format!("{}.test.", stem),
        format!("{}.spec.", stem),
        format!("{}-test.", stem),
        format!("{}-spec.", stem),
        format!("test-{}.", stem),
        format!("spec-{}.", stem),
        format!("test_{}.", stem),
        format!("{}_test.", stem),
    ]
}

/// Returns true if `test` is named like a test for `source`.
///
/// Besides the prefix patterns this also accepts a file with the same stem
/// inside a directory whose name mentions tests (`__tests__/user.js`).
pub fn is_test_for(source: &Path, test: &Path) -> bool {
    let name = match test.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    if test_file_candidates(source)
        .iter()
        .any(|prefix| name.starts_with(prefix.as_str()))
    {
        return true;
    }

    let in_test_dir = test
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| n.contains("test"))
        .unwrap_or(false);

    in_test_dir && test.file_stem().is_some() && test.file_stem() == source.file_stem()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path(Path::new("src/a.ts")), Some("typescript"));
        assert_eq!(language_for_path(Path::new("lib/x.RS")), Some("rust"));
        assert_eq!(language_for_path(Path::new("README.md")), None);
        assert_eq!(language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file(Path::new("src/user.test.js")));
        assert!(is_test_file(Path::new("src/user.spec.ts")));
        assert!(is_test_file(Path::new("pkg/test_user.py")));
        assert!(is_test_file(Path::new("pkg/user_test.go")));
        assert!(is_test_file(Path::new("src/__tests__/user.js")));
        assert!(!is_test_file(Path::new("src/user.js")));
        assert!(!is_test_file(Path::new("src/user.test.md")));
    }

    #[test]
    fn test_is_test_for() {
        let source = Path::new("src/user.js");
        assert!(is_test_for(source, Path::new("test/user.test.js")));
        assert!(is_test_for(source, Path::new("src/__tests__/user.js")));
        assert!(is_test_for(source, Path::new("spec-user.ts")));
        assert!(!is_test_for(source, Path::new("test/account.test.js")));
        assert!(!is_test_for(source, Path::new("src/user.js")));
    }
}
