//! Header-driven CSV and TSV parsing.

use quarry_types::{ParsingConfig, RepositoryInfo, RepositoryPackage};

use crate::ParseError;

pub(crate) fn parse_csv(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    parse_delimited(content, config, repository, b',')
}

pub(crate) fn parse_tsv(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    parse_delimited(content, config, repository, b'\t')
}

fn parse_delimited(
    content: &str,
    config: &ParsingConfig,
    repository: &RepositoryInfo,
    delimiter: u8,
) -> Result<Vec<RepositoryPackage>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers().map_err(ParseError::Csv)?.clone();
    let fields = &config.fields;
    let column = |logical: &str| {
        let source = fields.source(logical);
        headers.iter().position(|header| header == source)
    };
    let name_column = column("name");
    let version_column = column("version");
    let description_column = column("description");
    let homepage_column = column("homepage");
    let license_column = column("license");
    let maintainer_column = column("maintainer");

    let mut packages = Vec::new();
    for record in reader.records() {
        let record = record.map_err(ParseError::Csv)?;
        let cell = |index: Option<usize>| {
            index
                .and_then(|index| record.get(index))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        };

        let Some(name) = cell(name_column) else {
            continue;
        };
        let version = cell(version_column).unwrap_or_else(|| "unknown".to_string());
        let mut package =
            RepositoryPackage::new(name, version, &repository.name, repository.platform);
        package.description = cell(description_column);
        package.homepage = cell(homepage_column);
        package.license = cell(license_column);
        package.maintainer = cell(maintainer_column);
        packages.push(package);
    }
    Ok(packages)
}
