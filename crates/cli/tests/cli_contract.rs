use assert_cmd::Command;
use pdf_engine::test_support::{encrypted_marker_pdf, sample_pdf};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn cli() -> Command {
    Command::cargo_bin("paperdeck-cli").expect("binary should build")
}

fn write_fixture(dir: &Path, name: &str, bytes: Vec<u8>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture should be writable");
    path
}

fn info_page_count(file: &Path) -> u64 {
    let output = cli().arg("info").arg(file).assert().success().get_output().stdout.clone();
    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    value["page_count"].as_u64().expect("page_count should be a number")
}

#[test]
fn info_emits_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(3));

    let output = cli().arg("info").arg(&file).assert().success().get_output().stdout.clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 3);
    assert_eq!(value["first_page_size_pt"]["width"], 612.0);
    assert_eq!(value["first_page_size_pt"]["height"], 792.0);
    assert!(value["path"].as_str().is_some_and(|path| path.ends_with("deck.pdf")));
}

#[test]
fn pages_lists_stable_ids_and_cover_candidates() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(5));

    let output = cli().arg("pages").arg(&file).assert().success().get_output().stdout.clone();

    let pages: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    let pages = pages.as_array().expect("page list expected");
    assert_eq!(pages.len(), 5);
    assert_eq!(pages[0]["id"], "page-1");
    assert_eq!(pages[4]["page_number"], 5);
    assert_eq!(pages[2]["cover_candidate"], true);
    assert_eq!(pages[3]["cover_candidate"], false);
    assert!(pages.iter().all(|page| page["has_thumbnail"] == true));
}

#[test]
fn render_thumb_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(2));
    let output_path = temp.path().join("thumb.png");

    cli()
        .arg("render-thumb")
        .arg(&file)
        .arg("--page")
        .arg("2")
        .arg("--width")
        .arg("120")
        .arg("--height")
        .arg("120")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert!(output_path.exists(), "thumbnail output file should exist");

    let image = image::open(&output_path).expect("thumbnail should be a readable image");
    assert!(image.width() > 0);
    assert!(image.height() > 0);
}

#[test]
fn delete_page_writes_edited_pdf_with_default_name() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(3));

    cli()
        .arg("delete-page")
        .arg(&file)
        .arg("--page")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("deck_edited.pdf"));

    let edited = temp.path().join("deck_edited.pdf");
    assert!(edited.exists(), "edited PDF should exist");
    assert_eq!(info_page_count(&edited), 2);
}

#[test]
fn delete_page_refuses_the_only_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "single.pdf", sample_pdf(1));

    cli()
        .arg("delete-page")
        .arg(&file)
        .arg("--page")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("only remaining page"));
}

#[test]
fn export_subset_keeps_only_selected_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(5));
    let output_path = temp.path().join("subset.pdf");

    cli()
        .arg("export")
        .arg(&file)
        .arg("--pages")
        .arg("1,4")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert_eq!(info_page_count(&output_path), 2);
}

#[test]
fn export_without_selection_copies_all_pages() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(4));
    let output_path = temp.path().join("all.pdf");

    cli().arg("export").arg(&file).arg("--output").arg(&output_path).assert().success();

    assert_eq!(info_page_count(&output_path), 4);
}

#[test]
fn cover_applies_template_and_keeps_page_count() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(3));
    let output_path = temp.path().join("covered.pdf");

    cli()
        .arg("cover")
        .arg(&file)
        .arg("--page")
        .arg("1")
        .arg("--template")
        .arg("business")
        .arg("--with-text")
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    assert_eq!(info_page_count(&output_path), 3);

    // The raster overlay lands in the output as a DCTDecode image.
    let bytes = fs::read(&output_path).expect("output should be readable");
    assert!(bytes.windows(b"DCTDecode".len()).any(|window| window == b"DCTDecode"));
}

#[test]
fn cover_fails_cleanly_for_out_of_range_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "deck.pdf", sample_pdf(2));

    cli()
        .arg("cover")
        .arg(&file)
        .arg("--page")
        .arg("99")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to start cover session"));

    // A failed cover run writes nothing.
    assert!(!temp.path().join("deck_edited.pdf").exists());
}

#[test]
fn info_fails_for_missing_file() {
    cli()
        .arg("info")
        .arg("definitely-missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn delete_page_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "invalid.pdf", b"not a pdf at all".to_vec());

    cli()
        .arg("delete-page")
        .arg(&file)
        .arg("--page")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "locked.pdf", encrypted_marker_pdf());

    cli()
        .arg("info")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}
