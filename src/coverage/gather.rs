use crate::config::RunConfig;
use crate::coverage::aggregate::aggregate;
use crate::coverage::excludes::find_excl_blocks;
use crate::coverage::reduce::CoverageStats;
use crate::tools::CoverageTool;
use crate::types::{Error, SourceFileReport};
use crate::utils::io::{digest_bytes, file_digest};

/// Tool, host and user tags, lowercased and deduplicated
pub fn exclusion_tags<T: CoverageTool>(tool: &T, user_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = tool
        .default_exclusion_tags()
        .into_iter()
        .chain(user_tags.iter().cloned())
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Runs the whole pipeline: preprocess, aggregate, exclude and reduce.
///
/// Returns one record per relevant source file, sorted by name, and adds the
/// file's numbers to `stats`. Fails only when an external tool fails.
pub fn gather_coverage<T>(
    tool: &T,
    config: &RunConfig,
    stats: &mut CoverageStats,
) -> Result<Vec<SourceFileReport>, Error>
where
    T: CoverageTool + Sync,
{
    let tags = exclusion_tags(tool, &config.tags);
    log::debug!("Active exclusion tags: {}", tags.join(", "));

    tool.preprocess()?;

    let coverage = aggregate(tool, &config.int_dir, &config.src_dir, &config.dirs);

    let mut result = Vec::with_capacity(coverage.files.len());
    for (name, file) in coverage.files {
        let (digest, line_count) = match file_digest(&file.path) {
            Ok(digest) => digest,
            Err(e) => {
                log::warn!("Cannot digest '{}': {}", file.path.display(), e);
                digest_bytes(&[])
            }
        };

        let exclusions = find_excl_blocks(&tags, &name, &config.src_dir);
        let mut lines = file.lines;
        stats.erase_lines(&mut lines, &exclusions);
        result.push(stats.clean_file_report(&name, &digest, line_count, &lines, file.functions));
    }

    Ok(result)
}
