//! The extension capability contract: phonemizers turn lyrics into phoneme
//! sequences. Extensions ship as dynamic libraries discovered by
//! [`crate::plugins`]; one pass-through phonemizer is compiled in so a bare
//! install always validates.

use std::fmt;

/// Runtime behavior produced by a descriptor's factory.
pub trait Phonemizer {
    fn phonemize(&self, lyric: &str) -> Vec<String>;
}

/// Metadata extracted from a discovered extension. `tag` is the stable
/// identity tracks reference; the factory produces behavior instances on
/// demand. Descriptors are plain data so a whole catalog can be built and
/// sorted before any behavior is instantiated.
pub struct PhonemizerDescriptor {
    pub tag: String,
    pub name: String,
    pub factory: fn() -> Box<dyn Phonemizer>,
}

impl fmt::Debug for PhonemizerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonemizerDescriptor")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish()
    }
}

/// The capability catalog: every descriptor discovered at startup, sorted
/// ascending by tag. Duplicate tags are permitted and preserved; lookup
/// takes the first match.
#[derive(Debug, Default)]
pub struct PhonemizerCatalog {
    descriptors: Vec<PhonemizerDescriptor>,
}

impl PhonemizerCatalog {
    pub fn new(mut descriptors: Vec<PhonemizerDescriptor>) -> Self {
        descriptors.sort_by(|a, b| a.tag.cmp(&b.tag));
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[PhonemizerDescriptor] {
        &self.descriptors
    }

    pub fn find(&self, tag: &str) -> Option<&PhonemizerDescriptor> {
        self.descriptors.iter().find(|d| d.tag == tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.find(tag).is_some()
    }

    /// Instantiate the phonemizer for `tag`, falling back to the built-in
    /// pass-through when the tag is unknown on this machine.
    pub fn resolve(&self, tag: &str) -> Box<dyn Phonemizer> {
        match self.find(tag) {
            Some(descriptor) => (descriptor.factory)(),
            None => Box::new(DefaultPhonemizer),
        }
    }
}

/// Built-in fallback: the lyric is its own single phoneme.
pub struct DefaultPhonemizer;

impl Phonemizer for DefaultPhonemizer {
    fn phonemize(&self, lyric: &str) -> Vec<String> {
        vec![lyric.to_string()]
    }
}

/// Descriptors compiled into the host itself. Always present in the catalog
/// regardless of what the filesystem scan finds.
pub fn builtin_descriptors() -> Vec<PhonemizerDescriptor> {
    vec![PhonemizerDescriptor {
        tag: "DEFAULT".to_string(),
        name: "Default (pass-through)".to_string(),
        factory: || Box::new(DefaultPhonemizer),
    }]
}
