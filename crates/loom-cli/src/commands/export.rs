//! `loom export` (§6). Grounded on `original_source/cmd/export/{export,
//! name,hash,tar,csv}.go`, one mode per `--name`/`--hash`/`--tar`/`--csv`
//! flag (mutually exclusive, enforced by `cli.rs`'s `ArgGroup`).

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use loom_core::store::{BlobStore, Catalog};
use loom_sqlite::pool::PoolProvider;
use loom_sqlite::{build_pool, SqliteBlobStore, SqliteCatalog, StoreConfig};

use crate::cli::ExportArgs;

/// Tar entries are grouped by resource name and paged every 10,000 entries
/// per group, matching `original_source/cmd/export/tar.go`'s `page` counter.
const TAR_PAGE_SIZE: usize = 10_000;

pub fn execute(db: &Path, args: &ExportArgs) -> Result<()> {
    let config = StoreConfig::new(db);
    let pool = build_pool(&config)?;
    let catalog = SqliteCatalog::new(PoolProvider { pool: pool.clone() });
    let blobs = SqliteBlobStore::open(PoolProvider { pool }, config.objects_root())?;

    if let Some(name) = &args.name {
        return export_by_name(&catalog, name);
    }
    if let Some(hash) = &args.hash {
        return export_by_hash(&blobs, hash);
    }
    if let Some(path) = &args.tar {
        return export_tar(&catalog, &blobs, path, args.compressed);
    }
    if let Some(dest) = &args.csv {
        return export_csv(&catalog, &blobs, dest);
    }
    unreachable!("cli.rs's ArgGroup requires exactly one export mode");
}

fn export_by_name(catalog: &SqliteCatalog, name: &str) -> Result<()> {
    let mut found = false;
    for resource in catalog.resources_by_name(name)? {
        let resource = resource?;
        println!("{}\t{}\t{}", resource.object_hash, resource.name, resource.created_at.to_rfc3339());
        found = true;
    }
    if !found {
        bail!("no resources found with name '{name}'");
    }
    Ok(())
}

fn export_by_hash(blobs: &SqliteBlobStore, hash: &str) -> Result<()> {
    let bytes = blobs.get(hash).with_context(|| format!("object '{hash}' not found"))?;
    io::stdout().write_all(&bytes)?;
    Ok(())
}

fn export_tar(catalog: &SqliteCatalog, blobs: &SqliteBlobStore, dest: &Path, compressed: bool) -> Result<()> {
    let file = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;

    if compressed {
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let encoder = write_tar_entries(catalog, blobs, encoder)?;
        encoder.finish()?;
    } else {
        let mut file = write_tar_entries(catalog, blobs, file)?;
        file.flush()?;
    }
    Ok(())
}

fn write_tar_entries<W: Write>(catalog: &SqliteCatalog, blobs: &SqliteBlobStore, writer: W) -> Result<W> {
    let mut builder = tar::Builder::new(writer);

    for name in catalog.all_resource_names()? {
        let mut page = 0usize;
        let mut in_page = 0usize;
        for resource in catalog.resources_by_name(&name)? {
            let resource = resource?;
            let bytes = blobs.get(&resource.object_hash)?;

            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            let entry_path = format!("{}/{}/{}", name, page, resource.object_hash);
            builder.append_data(&mut header, entry_path, bytes.as_slice())?;

            in_page += 1;
            if in_page == TAR_PAGE_SIZE {
                page += 1;
                in_page = 0;
            }
        }
    }

    Ok(builder.into_inner()?)
}

fn export_csv(catalog: &SqliteCatalog, blobs: &SqliteBlobStore, dest: &str) -> Result<()> {
    // One trailing column per logical (name, resource_name) column, latest
    // version only — a version bump must not duplicate a CSV header entry.
    let columns = catalog.latest_columns()?;

    let mut writer = if dest == "-" {
        csv::Writer::from_writer(Box::new(io::stdout()) as Box<dyn Write>)
    } else {
        let file = File::create(dest).with_context(|| format!("creating {dest}"))?;
        csv::Writer::from_writer(Box::new(file) as Box<dyn Write>)
    };

    let mut header = vec!["id".to_string(), "name".to_string(), "object_hash".to_string(), "created_at".to_string()];
    header.extend(columns.iter().map(|c| c.name.clone()));
    writer.write_record(&header)?;

    for resource in catalog.all_resources()? {
        let resource = resource?;
        let mut row = vec![resource.id.to_string(), resource.name.clone(), resource.object_hash.clone(),
                            resource.created_at.to_rfc3339()];

        for column in &columns {
            // A column only ever holds values for its own declared
            // resource_name; other resources get an empty cell rather than
            // a lookup against an id that could never match.
            if column.resource_name != resource.name {
                row.push(String::new());
                continue;
            }
            let value = catalog.column_value(column.id, resource.id)?
                                .and_then(|v| blobs.get(&v.object_hash).ok())
                                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                                .unwrap_or_default();
            row.push(value);
        }

        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
