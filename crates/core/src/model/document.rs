//! Document assembly and file serialization.

use rustc_hash::FxHashMap;

use crate::error::{QuireError, Result};
use crate::model::objects::{ObjectId, PdfObject};

/// A PDF document under construction.
///
/// Object numbers are handed out by the document itself, starting at 1,
/// so two documents never share an allocator. Objects are written out in
/// registration order regardless of their numbers.
#[derive(Debug, Default)]
pub struct Document {
    objects: Vec<PdfObject>,
    next_id: ObjectId,
    /// Catalog object, referenced from the trailer as /Root.
    pub root: Option<ObjectId>,
    /// Info dictionary, referenced from the trailer as /Info.
    pub info: Option<ObjectId>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            next_id: 1,
            root: None,
            info: None,
        }
    }

    /// Reserve the next object number without registering an object.
    /// Useful when objects must reference each other cyclically.
    pub fn alloc(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Allocate a number for `make`'s object and register it.
    pub fn add(&mut self, make: impl FnOnce(ObjectId) -> PdfObject) -> ObjectId {
        let id = self.alloc();
        self.objects.push(make(id));
        id
    }

    /// Register an object built around a previously allocated number.
    pub fn insert(&mut self, obj: PdfObject) {
        debug_assert!(obj.id < self.next_id, "object number was never allocated");
        self.objects.push(obj);
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut PdfObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize the whole document into a PDF file image.
    ///
    /// The cross-reference table covers object numbers 0 through the
    /// highest allocated number; entry 0 is the conventional free-list
    /// head. Offsets are exact byte positions of each `N 0 obj` line.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let root = self.root.ok_or(QuireError::NoCatalog)?;
        let info = self.info.ok_or(QuireError::NoInfo)?;

        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.5\n");

        let mut offsets: FxHashMap<ObjectId, u64> = FxHashMap::default();
        for obj in &self.objects {
            offsets.insert(obj.id, out.len() as u64);
            obj.write(&mut out);
        }

        let size = self.next_id;
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n");
        out.extend_from_slice(format!("0 {size}\n").as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..size {
            // Numbers allocated but never registered become free
            // entries, keeping the table contiguous.
            match offsets.get(&id) {
                Some(off) => out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }

        out.extend_from_slice(b"trailer\n<<\n");
        out.extend_from_slice(format!("/Size {size}\n").as_bytes());
        out.extend_from_slice(format!("/Root {root} 0 R\n").as_bytes());
        out.extend_from_slice(format!("/Info {info} 0 R\n").as_bytes());
        out.extend_from_slice(b">>\n");
        out.extend_from_slice(format!("startxref\n{xref_pos}\n%%EOF\n").as_bytes());
        Ok(out)
    }
}
