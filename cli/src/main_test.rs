use super::*;
use biblioteca::net::types::{BookType, Profile};
use clap::CommandFactory;
use serde_json::json;

fn add_book(format_args: &[&str]) -> NewBook {
    let mut argv = vec![
        "biblio", "admin", "add-book", "--title", "Dune", "--author", "Frank Herbert", "--isbn", "1",
        "--category", "Fiction",
    ];
    argv.extend_from_slice(format_args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let Command::Admin(AdminCommand { command: AdminSubcommand::AddBook(args) }) = cli.command else {
        panic!("expected admin add-book, got {:?}", cli.command);
    };
    NewBook::from(args)
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn add_book_maps_each_format() {
    let digital = add_book(&["digital", "--file-size-mb", "2.5"]);
    assert_eq!(digital.title, "Dune");
    assert_eq!(digital.category, "Fiction");
    assert_eq!(digital.format, BookFormat::Digital { file_format: "PDF".to_owned(), file_size_mb: 2.5 });

    let audio = add_book(&["audio", "--narrator", "Scott Brick", "--duration-minutes", "1260"]);
    assert_eq!(
        audio.format,
        BookFormat::Audio { narrator: "Scott Brick".to_owned(), duration_minutes: 1260, audio_format: "MP3".to_owned() }
    );

    let ebook = add_book(&["ebook", "--publisher", "Ace", "--page-count", "412", "--interactive"]);
    assert_eq!(ebook.format.kind(), BookType::EBook);
    assert_eq!(
        ebook.format,
        BookFormat::EBook { publisher: "Ace".to_owned(), page_count: 412, has_interactive_content: true }
    );
}

#[test]
fn add_book_requires_a_format() {
    let argv = ["biblio", "admin", "add-book", "--title", "T", "--author", "A", "--isbn", "1", "--category", "C"];
    assert!(Cli::try_parse_from(argv).is_err());
}

#[test]
fn books_search_and_category_are_exclusive() {
    assert!(Cli::try_parse_from(["biblio", "books", "--search", "dune", "--category", "Fiction"]).is_err());
}

#[test]
fn flags_override_config() {
    let config = resolve_config(Some("https://library.test/api/"), Some(PathBuf::from("/tmp/s.json"))).unwrap();
    assert_eq!(config.base_url, "https://library.test/api");
    assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));

    let config = resolve_config(Some("https://library.test/api"), None).unwrap();
    assert_eq!(config.session_file, PathBuf::from(biblioteca::config::DEFAULT_SESSION_FILE));
}

#[test]
fn invalid_base_url_flag_is_a_config_error() {
    assert!(matches!(resolve_config(Some("library.test"), None), Err(CliError::Config(_))));
}

#[test]
fn connect_persists_session_to_the_flagged_file() {
    let path = std::env::temp_dir().join(format!("biblio-cli-{}.json", uuid::Uuid::new_v4()));
    let api = connect(Some("http://library.test/api"), Some(path.clone())).unwrap();
    let profile: Profile = serde_json::from_value(json!({ "username": "ana", "fullName": "Ana Lima", "role": "USER" })).unwrap();

    api.session().save("tok-1", &profile);

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("tok-1"));
    let _ = std::fs::remove_file(path);
}
