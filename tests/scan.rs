use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sensitive_marker::semantic::FileReferenceResolver;
use sensitive_marker::text::{NormalizedSpans, TextBuffer};
use sensitive_marker::workspace::{
    DirectoryProvider, DocumentId, DocumentProvider, InMemoryProvider, ProjectDocuments,
    SourceDocument,
};
use sensitive_marker::{
    Invalidation, MarkerConfig, NodeKind, ScanCoordinator, SensitiveScanner, SensitiveTagger,
    Snapshot, Span, SpanCache, TagsChanged, TagsChangedListener,
};

const SECRET_CS: &str = r#"
namespace Vault.Core
{
    public interface ISensitiveObject { }

    public class Secret : ISensitiveObject
    {
        public Secret Foo() { return this; }
    }
}
"#;

fn span_of(text: &str, needle: &str) -> Span {
    let start = text.find(needle).unwrap();
    Span::new(start, needle.len())
}

fn scanner(provider: Arc<dyn DocumentProvider>) -> SensitiveScanner {
    scanner_with(provider, &MarkerConfig::default())
}

fn scanner_with(provider: Arc<dyn DocumentProvider>, config: &MarkerConfig) -> SensitiveScanner {
    SensitiveScanner::new(provider, Arc::new(FileReferenceResolver), config)
}

/// An in-memory project with `Secret.cs` and the given active buffer text
fn project_with(active: &str) -> (Arc<InMemoryProvider>, Arc<TextBuffer>) {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_document("Vault", SourceDocument::new("Secret.cs", 0, SECRET_CS));
    let buffer = Arc::new(TextBuffer::new(active));
    provider.open_buffer(Arc::clone(&buffer), "Vault", "Program.cs");
    (provider, buffer)
}

#[test_log::test]
fn file_without_implementers_is_empty() {
    let provider = Arc::new(InMemoryProvider::new());
    let buffer = Arc::new(TextBuffer::new(
        "class Account { public string Name; void Print() { Name.Trim(); } }",
    ));
    provider.open_buffer(Arc::clone(&buffer), "Bank", "Account.cs");

    let outcome = scanner(provider).scan(&buffer.current_snapshot());
    assert!(outcome.nodes.is_empty());
    assert!(outcome.spans.is_empty());
    assert!(outcome.skipped.is_empty());
}

#[test_log::test]
fn var_local_and_member_access_are_flagged() {
    let code = r#"
using Vault.Core;

class Program
{
    static Secret MakeSensitive() { return new Secret(); }

    static void Main()
    {
        var x = MakeSensitive();
        x.Foo();
    }
}
"#;
    let (provider, buffer) = project_with(code);
    let outcome = scanner(provider).scan(&buffer.current_snapshot());

    let access = span_of(code, "x.Foo");
    let x = Span::new(access.start, 1);
    assert!(outcome
        .nodes
        .iter()
        .any(|n| n.kind == NodeKind::MemberAccess && n.span == access));
    assert!(outcome
        .nodes
        .iter()
        .any(|n| n.kind == NodeKind::Identifier && n.span == x));
    assert!(outcome.nodes.iter().all(|n| n.text != "var"));

    let var = span_of(code, "var");
    assert!(outcome.spans.spans.iter().all(|s| s.overlap(&var).is_none()));
}

#[test_log::test]
fn interface_closure_is_transitive() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_document(
        "Vault",
        SourceDocument::new(
            "Contracts.cs",
            0,
            "interface ISensitiveObject { } interface I1 : ISensitiveObject { }",
        ),
    );
    provider.add_document("Vault", SourceDocument::new("T.cs", 0, "class T : I1 { }"));
    let code = "class Program { void Run(T value) { value.ToString(); } }";
    let buffer = Arc::new(TextBuffer::new(code));
    provider.open_buffer(Arc::clone(&buffer), "Vault", "Program.cs");

    let outcome = scanner(provider).scan(&buffer.current_snapshot());
    let value = span_of(code, "value.ToString").start;
    assert!(outcome
        .nodes
        .iter()
        .any(|n| n.span == Span::new(value, 5) && n.type_name == "T"));
}

#[test_log::test]
fn unparsable_sibling_does_not_stop_scan() {
    let (provider, buffer) = project_with("class Program { Vault.Core.Secret held; void Run() { held.Foo(); } }");
    provider.add_document("Vault", SourceDocument::new("Empty.cs", 0, ""));
    provider.add_document("Vault", SourceDocument::new("Broken.cs", 0, "class Broken { void M( { }"));

    let outcome = scanner(provider).scan(&buffer.current_snapshot());
    assert!(outcome.nodes.iter().any(|n| n.text == "held.Foo"));
    assert!(outcome.nodes.iter().any(|n| n.text == "held"));
}

#[test_log::test]
fn static_access_through_type_name() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_document(
        "Vault",
        SourceDocument::new(
            "Token.cs",
            0,
            "interface ISensitiveObject { } class Token : ISensitiveObject { public static void Revoke() { } }",
        ),
    );
    let code = "class Program { void Run() { Token.Revoke(); } }";
    let buffer = Arc::new(TextBuffer::new(code));
    provider.open_buffer(Arc::clone(&buffer), "Vault", "Program.cs");

    let outcome = scanner(provider).scan(&buffer.current_snapshot());
    let spans: Vec<Span> = outcome.spans.spans.iter().copied().collect();
    assert_eq!(spans, vec![span_of(code, "Token")]);
}

#[test_log::test]
fn extension_reference_manifest_contributes_types() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("Vault.Sdk.json");
    fs::write(
        &manifest,
        r#"{
            "name": "Vault.Sdk",
            "types": [
                { "name": "ISensitiveObject", "kind": "interface" },
                { "name": "Credential", "kind": "class", "bases": ["ISensitiveObject"] }
            ]
        }"#,
    )
    .unwrap();

    let provider = Arc::new(InMemoryProvider::new());
    let code = "class Program { Credential login; }";
    let buffer = Arc::new(TextBuffer::new(code));
    provider.open_buffer(Arc::clone(&buffer), "App", "Program.cs");

    let config = MarkerConfig {
        extension_references: vec![manifest],
        ..MarkerConfig::default()
    };
    let outcome = scanner_with(provider, &config).scan(&buffer.current_snapshot());
    assert_eq!(
        outcome.spans.spans.as_slice(),
        &[span_of(code, "Credential")]
    );
}

#[test_log::test]
fn missing_extension_reference_fails_open() {
    let (provider, buffer) = project_with("class Program { Vault.Core.Secret held; }");
    let config = MarkerConfig {
        extension_references: vec!["/opt/reference-assemblies/v4.5.2/System.Core.json".into()],
        ..MarkerConfig::default()
    };

    let outcome = scanner_with(provider, &config).scan(&buffer.current_snapshot());
    assert!(outcome.nodes.is_empty());
    assert!(outcome.spans.is_empty());
    assert_eq!(outcome.spans.version, 0);
}

/// Serves the active document from a stored text, ignoring the snapshot
struct StaleProvider {
    text: &'static str,
}

impl DocumentProvider for StaleProvider {
    fn project_for(&self, _snapshot: &Snapshot) -> Option<ProjectDocuments> {
        Some(ProjectDocuments {
            project: "Vault".to_string(),
            active: DocumentId::new("Program.cs"),
            documents: vec![
                SourceDocument::new("Secret.cs", 0, SECRET_CS),
                SourceDocument::new("Program.cs", 0, self.text),
            ],
        })
    }
}

#[test_log::test]
fn out_of_bounds_nodes_are_skipped() {
    let stale = "class P { Secret first; Secret second; }";
    let current = "class P { Secret first; }";
    let buffer = TextBuffer::new(current);

    let outcome = scanner(Arc::new(StaleProvider { text: stale })).scan(&buffer.current_snapshot());

    assert_eq!(
        outcome.nodes.iter().map(|n| n.span).collect::<Vec<_>>(),
        vec![span_of(current, "Secret")]
    );
    assert_eq!(outcome.skipped.len(), 1);
    let skipped = &outcome.skipped[0];
    assert_eq!(skipped.offset, stale.rfind("Secret").unwrap());
    assert_eq!(skipped.length, 6);
    assert_eq!(skipped.snapshot_len, current.len());
}

#[test_log::test]
fn cached_spans_survive_edits_after_them() {
    let code = "class Program { Vault.Core.Secret held; }";
    let (provider, buffer) = project_with(code);
    let cache = Arc::new(SpanCache::new());
    let coordinator = ScanCoordinator::new(scanner(provider), Arc::clone(&cache));

    coordinator.invalidate(Invalidation::TextEdited {
        snapshot: buffer.current_snapshot(),
    });
    let before = cache.spans_for(&buffer.current_snapshot());
    assert!(!before.is_empty());

    let edited = buffer.replace(code.len() - 1, 0, " int count; ").unwrap();
    assert_eq!(cache.spans_for(&edited), before);

    // An insertion in front shifts everything
    let shifted = buffer.replace(0, 0, "\n\n").unwrap();
    let expected: NormalizedSpans = before
        .iter()
        .map(|s| Span::new(s.start + 2, s.length))
        .collect();
    assert_eq!(cache.spans_for(&shifted), expected);
}

#[test_log::test]
fn directory_project_scans_unsaved_buffer() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Secret.cs"), SECRET_CS).unwrap();
    fs::write(dir.path().join("Program.cs"), "class Program { }").unwrap();

    let config = MarkerConfig::default();
    let provider = Arc::new(DirectoryProvider::new(dir.path(), &config));
    let buffer = Arc::new(TextBuffer::new("class Program { }"));
    provider.open_buffer(Arc::clone(&buffer), "Program.cs");
    let snapshot = buffer.replace(16, 0, "Vault.Core.Secret s; ").unwrap();

    let outcome = scanner_with(provider, &config).scan(&snapshot);
    assert_eq!(outcome.spans.version, 1);
    assert!(outcome.nodes.iter().any(|n| n.text == "Secret"));
}

#[test_log::test]
fn latin1_sibling_does_not_blank_directory_scan() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Secret.cs"), SECRET_CS).unwrap();
    fs::write(dir.path().join("Legacy.cs"), b"// Gr\xf6\xdfe\nclass Legacy { }".as_slice()).unwrap();
    let code = "class Program { Secret s; }";
    fs::write(dir.path().join("Program.cs"), code).unwrap();

    let config = MarkerConfig::default();
    let provider = Arc::new(DirectoryProvider::new(dir.path(), &config));
    let buffer = Arc::new(TextBuffer::new(code));
    provider.open_buffer(Arc::clone(&buffer), "Program.cs");

    let outcome = scanner_with(provider, &config).scan(&buffer.current_snapshot());
    let texts: Vec<&str> = outcome.nodes.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["Secret"]);
    assert_eq!(outcome.spans.spans.iter().next(), Some(&span_of(code, "Secret")));
}

#[test_log::test]
fn long_member_chain_is_classified_to_the_end() {
    let chain = ".Next".repeat(2500);
    let code = format!(
        "class Node : ISensitiveObject {{ public Node Next; void Walk() {{ var y = this{chain}; }} }}"
    );
    let (provider, buffer) = project_with(&code);

    let outcome = scanner(provider).scan(&buffer.current_snapshot());
    assert!(outcome.skipped.is_empty());
    assert!(outcome.nodes.iter().any(|n| n.text == "Node"));
    assert!(outcome.nodes.iter().any(|n| n.text == "this.Next"));
    assert!(outcome
        .nodes
        .iter()
        .any(|n| n.kind == NodeKind::MemberAccess && n.text == format!("this{chain}")));
}

#[test_log::test]
fn concurrent_rescans_never_expose_mixed_sets() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_document("Vault", SourceDocument::new("Secret.cs", 0, SECRET_CS));
    let left = Arc::new(TextBuffer::new("class A { Secret one; }"));
    let right = Arc::new(TextBuffer::new("class B { int n; Secret two; Secret three; }"));
    provider.open_buffer(Arc::clone(&left), "Vault", "A.cs");
    provider.open_buffer(Arc::clone(&right), "Vault", "B.cs");

    let cache = Arc::new(SpanCache::new());
    let coordinator = Arc::new(ScanCoordinator::new(scanner(provider), Arc::clone(&cache)));

    let expected_left = coordinator
        .scanner()
        .scan(&left.current_snapshot())
        .spans
        .spans
        .clone();
    let expected_right = coordinator
        .scanner()
        .scan(&right.current_snapshot())
        .spans
        .spans
        .clone();
    assert_eq!(expected_left.len(), 1);
    assert_eq!(expected_right.len(), 2);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let buffer = Arc::clone(if i % 2 == 0 { &left } else { &right });
            thread::spawn(move || {
                for _ in 0..5 {
                    coordinator.invalidate(Invalidation::ClassificationChanged {
                        snapshot: buffer.current_snapshot(),
                    });
                }
            })
        })
        .collect();

    let reader = {
        let cache = Arc::clone(&cache);
        let (left_id, right_id) = (left.id(), right.id());
        thread::spawn(move || {
            for _ in 0..200 {
                if let Some(set) = cache.current() {
                    if set.buffer == left_id {
                        assert_eq!(set.spans, expected_left);
                    } else {
                        assert_eq!(set.buffer, right_id);
                        assert_eq!(set.spans, expected_right);
                    }
                }
                thread::yield_now();
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    reader.join().unwrap();
}

struct Collector(Mutex<Vec<TagsChanged>>);

impl TagsChangedListener for Collector {
    fn tags_changed(&self, event: &TagsChanged) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[test_log::test]
fn tagger_reports_whole_document_after_rescan() {
    let code = "class Program { Vault.Core.Secret held; }";
    let (provider, buffer) = project_with(code);
    let cache = Arc::new(SpanCache::new());
    let coordinator = ScanCoordinator::new(scanner(provider), Arc::clone(&cache));
    let tagger = SensitiveTagger::new(Arc::clone(&buffer), Arc::clone(&cache));
    let collector = Arc::new(Collector(Mutex::new(Vec::new())));
    tagger.add_listener(collector.clone());

    coordinator.invalidate(Invalidation::LayoutChanged {
        snapshot: buffer.current_snapshot(),
    });

    let events = collector.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].span.span, Span::new(0, code.len()));

    let tags = tagger.tags(&[buffer.current_snapshot().full_span()]);
    let tagged: Vec<&str> = tags.iter().filter_map(|t| t.span.text()).collect();
    assert_eq!(tagged, vec!["Secret"]);
}
