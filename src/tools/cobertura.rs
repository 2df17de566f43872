use crate::tools::CoverageTool;
use crate::types::{Error, FileMap, LineDecl};
use crate::utils::paths::{absolute, filesystem_root, normalize};
use roxmltree::{Document, Node, ParsingOptions};
use std::path::{Path, PathBuf};

/// Cobertura XML reports (`*.xml`), e.g. from OpenCppCoverage
#[derive(Debug, Clone, Default)]
pub struct CoberturaXml;

impl CoberturaXml {
    pub fn new() -> Self {
        Self
    }

    /// Parses a Cobertura document.
    ///
    /// `intermediate_file` is only used to find a disk root when the document
    /// does not name exactly one source directory.
    pub fn parse_xml(&self, xml: &str, intermediate_file: &Path) -> Result<FileMap, Error> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(xml.trim_start_matches('\u{feff}'), options)?;
        let root = document.root_element();

        let sources = child_elements(root, "sources").next();
        let Some(packages) = child_elements(root, "packages").next() else {
            return Ok(FileMap::new());
        };

        let diskname = sources
            .and_then(diskname_from_sources)
            .unwrap_or_else(|| {
                log::debug!(
                    "No single <source> in {}; resolving against the filesystem root",
                    intermediate_file.display()
                );
                filesystem_root(&absolute(intermediate_file))
                    .to_string_lossy()
                    .into_owned()
            });
        let disk = with_trailing_separator(diskname);

        let mut result = FileMap::new();
        for package in packages.children().filter(Node::is_element) {
            for classes in child_elements(package, "classes") {
                for class in child_elements(classes, "class") {
                    let Some(filename) = class.attribute("filename") else {
                        continue;
                    };
                    let Some(lines) = child_elements(class, "lines").next() else {
                        continue;
                    };

                    let mut coverage: Vec<LineDecl> = child_elements(lines, "line")
                        .filter_map(|line| {
                            let number: u32 = line.attribute("number")?.trim().parse().ok()?;
                            let hits: u64 = line.attribute("hits")?.trim().parse().ok()?;
                            (number > 0).then(|| LineDecl::new(number, hits, Some(false)))
                        })
                        .collect();
                    if coverage.is_empty() {
                        continue;
                    }
                    coverage.sort();

                    let path = normalize(&PathBuf::from(&disk).join(filename));
                    result.entry(path).or_default().lines.extend(coverage);
                }
            }
        }

        Ok(result)
    }
}

fn child_elements<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

/// The disk prefix is only trusted when `<sources>` lists exactly one entry;
/// with several entries there is no way to tell which one a class belongs to
fn diskname_from_sources(sources: Node<'_, '_>) -> Option<String> {
    let disks: Vec<&str> = child_elements(sources, "source")
        .filter_map(|source| source.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect();
    match disks.as_slice() {
        [disk] => Some(disk.to_string()),
        _ => None,
    }
}

fn with_trailing_separator(mut disk: String) -> String {
    if !disk.is_empty() && !disk.ends_with(['/', '\\']) {
        disk.push(std::path::MAIN_SEPARATOR);
    }
    disk
}

impl CoverageTool for CoberturaXml {
    fn extension(&self) -> &str {
        ".xml"
    }

    fn preprocess(&self) -> Result<(), Error> {
        Ok(())
    }

    fn read(&self, intermediate_file: &Path) -> Result<FileMap, Error> {
        let xml = std::fs::read_to_string(intermediate_file)?;
        self.parse_xml(&xml, intermediate_file)
    }

    fn family_tags(&self) -> &'static [&'static str] {
        &["msvc"]
    }
}
