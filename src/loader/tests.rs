use super::*;
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent directories");
    }
    fs::write(&path, contents).expect("should write fixture file");
    path
}

#[test]
fn document_kind_from_extension() {
    assert_eq!(
        DocumentKind::from_path(Path::new("notes.txt")),
        Some(DocumentKind::Text)
    );
    assert_eq!(
        DocumentKind::from_path(Path::new("Report.PDF")),
        Some(DocumentKind::Pdf)
    );
    assert_eq!(
        DocumentKind::from_path(Path::new("README.Txt")),
        Some(DocumentKind::Text)
    );
    assert_eq!(DocumentKind::from_path(Path::new("page.html")), None);
    assert_eq!(DocumentKind::from_path(Path::new("Makefile")), None);
}

#[test]
fn loads_text_files_recursively() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let root = temp_dir.path();
    write(root, "xss.txt", b"Cross-site scripting injects scripts.");
    write(root, "nested/deeper/csrf.txt", b"CSRF forges requests.");
    write(root, "nested/SQLI.TXT", b"SQL injection alters queries.");

    let report = load_documents(root).expect("should load documents");

    assert_eq!(report.files_loaded, 3);
    assert_eq!(report.documents.len(), 3);
    assert!(report.skipped.is_empty());
    assert!(report.failed.is_empty());
    assert!(report.documents.iter().all(|d| d.page.is_none()));
    assert!(
        report
            .documents
            .iter()
            .any(|d| d.content == "CSRF forges requests." && d.source.ends_with("csrf.txt"))
    );
}

#[test]
fn unsupported_files_are_skipped() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let root = temp_dir.path();
    write(root, "keep.txt", b"kept");
    let markdown = write(root, "notes.md", b"# skipped");
    let image = write(root, "img/logo.png", &[0x89, 0x50, 0x4e, 0x47]);

    let report = load_documents(root).expect("should load documents");

    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.contains(&markdown));
    assert!(report.skipped.contains(&image));
}

#[test]
fn failing_files_do_not_stop_ingestion() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let root = temp_dir.path();
    write(root, "a_good.txt", b"first");
    let bad_text = write(root, "b_binary.txt", &[0xff, 0xfe, 0x00, 0xc3, 0x28]);
    let bad_pdf = write(root, "c_broken.pdf", b"this is not a pdf");
    write(root, "d_good.txt", b"second");

    let report = load_documents(root).expect("should load documents");

    assert_eq!(report.files_loaded, 2);
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.failed.len(), 2);

    let failed: Vec<&PathBuf> = report.failed.iter().map(|(path, _)| path).collect();
    assert!(failed.contains(&&bad_text));
    assert!(failed.contains(&&bad_pdf));
    assert!(report.failed.iter().all(|(_, reason)| !reason.is_empty()));
}

#[test]
fn visiting_order_is_stable() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let root = temp_dir.path();
    write(root, "zeta.txt", b"z");
    write(root, "alpha.txt", b"a");
    write(root, "mid/beta.txt", b"b");

    let first = load_documents(root).expect("should load documents");
    let second = load_documents(root).expect("should load documents");

    let contents: Vec<&str> = first.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["a", "b", "z"]);
    assert_eq!(first.documents, second.documents);
}

#[test]
fn empty_text_file_still_counts_as_loaded() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    write(temp_dir.path(), "empty.txt", b"");

    let report = load_documents(temp_dir.path()).expect("should load documents");
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.documents[0].content, "");
}

#[test]
fn missing_directory_is_an_error() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let missing = temp_dir.path().join("does-not-exist");

    assert!(matches!(
        load_documents(&missing),
        Err(RagError::Loader(_))
    ));
}

/// Assemble a minimal PDF with one Helvetica text line per page
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use std::fmt::Write as _;

    let page_count = pages.len();
    let font_id = 3 + page_count;
    let content_id = |page: usize| font_id + 1 + page;

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + i)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            page_count
        ),
    ];
    for i in 0..page_count {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            font_id,
            content_id(i)
        ));
    }
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );
    for text in pages {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        write!(xref, "{:010} 00000 n \n", offset).expect("writing to a String cannot fail");
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

#[test]
fn pdf_pages_become_numbered_documents() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let pdf = write(
        temp_dir.path(),
        "guide.pdf",
        &pdf_with_pages(&["Clickjacking", "Referrer"]),
    );

    let report = load_documents(temp_dir.path()).expect("should load documents");

    assert!(report.failed.is_empty(), "failed: {:?}", report.failed);
    assert_eq!(report.files_loaded, 1);
    assert_eq!(report.documents.len(), 2);

    let pages: Vec<Option<u32>> = report.documents.iter().map(|d| d.page).collect();
    assert_eq!(pages, vec![Some(1), Some(2)]);
    assert!(report.documents.iter().all(|d| d.source == pdf));
    assert!(report.documents[0].content.contains("Clickjacking"));
    assert!(report.documents[1].content.contains("Referrer"));

    let chunks = crate::embeddings::split_document(
        &report.documents[0],
        &crate::embeddings::ChunkingConfig::default(),
    )
    .expect("should split first page");
    let citation = crate::database::ChunkMetadata::from_chunk(&chunks[0], "t").citation();
    assert_eq!(citation, "guide.pdf, Page: 1");
}
