use ngff::{ArrayOp, ArraySpec, DataType, GroupOp, NodeOp, Shape, Store};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

const ZGROUP: &str = ".zgroup";
const ZARRAY: &str = ".zarray";
const ZATTRS: &str = ".zattrs";

///////////////////////////////////////////////////////////////////////////////
/// Type definitions
///////////////////////////////////////////////////////////////////////////////

/// The Zarr store. Only metadata files are touched; chunk payload is out of
/// scope for this crate.
pub struct Zarr;

/// A group node: a directory carrying a `.zgroup` file.
pub struct ZarrGroup {
    root: PathBuf,
    path: PathBuf,
}

impl ZarrGroup {
    fn dir(&self) -> PathBuf {
        self.root.join(&self.path)
    }
}

/// An array node: a directory carrying a `.zarray` file.
pub struct ZarrArray {
    root: PathBuf,
    path: PathBuf,
    meta: ZarrArrayMeta,
    dtype: DataType,
}

impl ZarrArray {
    fn dir(&self) -> PathBuf {
        self.root.join(&self.path)
    }
}

/// Contents of a `.zgroup` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZarrGroupMeta {
    pub zarr_format: u32,
}

impl Default for ZarrGroupMeta {
    fn default() -> Self {
        ZarrGroupMeta { zarr_format: 2 }
    }
}

/// Contents of a `.zarray` file. `compressor` and `filters` are carried so
/// that files written by other tools read back unchanged, but this crate
/// always writes them as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZarrArrayMeta {
    pub zarr_format: u32,
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub dtype: String,
    pub compressor: Option<Value>,
    pub fill_value: Value,
    pub order: String,
    pub filters: Option<Value>,
}

impl ZarrArrayMeta {
    fn from_spec(spec: &ArraySpec) -> Self {
        ZarrArrayMeta {
            zarr_format: 2,
            shape: spec.shape.as_ref().to_vec(),
            chunks: spec.chunks.as_ref().to_vec(),
            dtype: dtype_to_zarr(spec.dtype).to_string(),
            compressor: None,
            fill_value: Value::from(0),
            order: "C".to_string(),
            filters: None,
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Store implementation
///////////////////////////////////////////////////////////////////////////////

impl Store for Zarr {
    const NAME: &'static str = "zarr";

    type Group = ZarrGroup;

    type Array = ZarrArray;

    fn create<P: AsRef<Path>>(path: P) -> Result<Self::Group> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        write_json(&root.join(ZGROUP), &ZarrGroupMeta::default())?;
        Ok(ZarrGroup {
            root,
            path: PathBuf::new(),
        })
    }

    fn open<P: AsRef<Path>>(path: P) -> Result<Self::Group> {
        let root = path.as_ref().to_path_buf();
        if !root.join(ZGROUP).is_file() {
            bail!("No zarr group found at '{}'", root.display());
        }
        Ok(ZarrGroup {
            root,
            path: PathBuf::new(),
        })
    }
}

impl GroupOp<Zarr> for ZarrGroup {
    /// List all groups and arrays in this group, in name order.
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            if dir.join(ZGROUP).is_file() || dir.join(ZARRAY).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn new_group(&self, name: &str) -> Result<ZarrGroup> {
        check_name(name)?;
        let dir = self.dir().join(name);
        fs::create_dir_all(&dir)?;
        write_json(&dir.join(ZGROUP), &ZarrGroupMeta::default())?;
        Ok(ZarrGroup {
            root: self.root.clone(),
            path: self.path.join(name),
        })
    }

    fn open_group(&self, name: &str) -> Result<ZarrGroup> {
        check_name(name)?;
        let dir = self.dir().join(name);
        if !dir.join(ZGROUP).is_file() {
            bail!("No group named '{}' at '{}'", name, self.dir().display());
        }
        Ok(ZarrGroup {
            root: self.root.clone(),
            path: self.path.join(name),
        })
    }

    fn new_array(&self, name: &str, spec: &ArraySpec) -> Result<ZarrArray> {
        check_name(name)?;
        let dir = self.dir().join(name);
        fs::create_dir_all(&dir)?;
        let meta = ZarrArrayMeta::from_spec(spec);
        write_json(&dir.join(ZARRAY), &meta)?;
        if !spec.attributes.is_empty() {
            write_json(&dir.join(ZATTRS), &spec.attributes)?;
        }
        Ok(ZarrArray {
            root: self.root.clone(),
            path: self.path.join(name),
            meta,
            dtype: spec.dtype,
        })
    }

    fn open_array(&self, name: &str) -> Result<ZarrArray> {
        check_name(name)?;
        let dir = self.dir().join(name);
        let meta: ZarrArrayMeta = read_json(&dir.join(ZARRAY))
            .with_context(|| format!("No array named '{}' at '{}'", name, self.dir().display()))?;
        let dtype = dtype_from_zarr(&meta.dtype)?;
        Ok(ZarrArray {
            root: self.root.clone(),
            path: self.path.join(name),
            meta,
            dtype,
        })
    }

    fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        fs::remove_dir_all(self.dir().join(name))?;
        Ok(())
    }

    /// Member names never span levels, so anything that is not a plain name
    /// simply does not exist.
    fn exists(&self, name: &str) -> Result<bool> {
        if check_name(name).is_err() {
            return Ok(false);
        }
        let dir = self.dir().join(name);
        Ok(dir.join(ZGROUP).is_file() || dir.join(ZARRAY).is_file())
    }
}

impl NodeOp<Zarr> for ZarrGroup {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn attrs(&self) -> Result<Map<String, Value>> {
        read_attrs(&self.dir())
    }

    fn put_attrs(&mut self, attrs: Map<String, Value>) -> Result<()> {
        write_json(&self.dir().join(ZATTRS), &attrs)
    }
}

impl NodeOp<Zarr> for ZarrArray {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn attrs(&self) -> Result<Map<String, Value>> {
        read_attrs(&self.dir())
    }

    fn put_attrs(&mut self, attrs: Map<String, Value>) -> Result<()> {
        write_json(&self.dir().join(ZATTRS), &attrs)
    }
}

impl ArrayOp<Zarr> for ZarrArray {
    fn dtype(&self) -> Result<DataType> {
        Ok(self.dtype)
    }

    fn shape(&self) -> Shape {
        self.meta.shape.as_slice().into()
    }

    fn spec(&self) -> Result<ArraySpec> {
        let mut spec = ArraySpec::new(
            self.dtype,
            self.meta.shape.as_slice(),
            self.meta.chunks.as_slice(),
        );
        spec.attributes = read_attrs(&self.dir())?;
        Ok(spec)
    }
}

///////////////////////////////////////////////////////////////////////////////
/// Auxiliary functions
///////////////////////////////////////////////////////////////////////////////

/// The NumPy byte-order name recorded in `.zarray` for each element type.
pub fn dtype_to_zarr(dtype: DataType) -> &'static str {
    match dtype {
        DataType::Int8 => "|i1",
        DataType::Int16 => "<i2",
        DataType::Int32 => "<i4",
        DataType::Int64 => "<i8",
        DataType::UInt8 => "|u1",
        DataType::UInt16 => "<u2",
        DataType::UInt32 => "<u4",
        DataType::UInt64 => "<u8",
        DataType::Float32 => "<f4",
        DataType::Float64 => "<f8",
        DataType::Bool => "|b1",
    }
}

/// Parse a `.zarray` dtype, accepting any byte-order marker.
pub fn dtype_from_zarr(dtype: &str) -> Result<DataType> {
    let out = match dtype.strip_prefix(['<', '>', '|'].as_slice()).unwrap_or(dtype) {
        "i1" => DataType::Int8,
        "i2" => DataType::Int16,
        "i4" => DataType::Int32,
        "i8" => DataType::Int64,
        "u1" => DataType::UInt8,
        "u2" => DataType::UInt16,
        "u4" => DataType::UInt32,
        "u8" => DataType::UInt64,
        "f4" => DataType::Float32,
        "f8" => DataType::Float64,
        "b1" => DataType::Bool,
        _ => bail!("Unsupported dtype '{}'", dtype),
    };
    Ok(out)
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        bail!("Invalid node name '{}'", name);
    }
    if name.contains('/') || name.contains('\\') {
        bail!("Node names cannot contain path separators. Got '{}'", name);
    }
    if name.starts_with('.') {
        bail!("Node names cannot start with '.'. Got '{}'", name);
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn read_attrs(dir: &Path) -> Result<Map<String, Value>> {
    let file = dir.join(ZATTRS);
    if !file.is_file() {
        return Ok(Map::new());
    }
    match read_json(&file)? {
        Value::Object(map) => Ok(map),
        _ => bail!("The attributes at '{}' are not a JSON object", file.display()),
    }
}

///////////////////////////////////////////////////////////////////////////////
/// test module
///////////////////////////////////////////////////////////////////////////////
