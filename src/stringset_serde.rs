use crate::StringSet;
use core::fmt;
use core::hash::BuildHasher;
use core::marker::PhantomData;
use serde_crate::de::{Deserialize, Deserializer, SeqAccess, Visitor};
use serde_crate::ser::{Serialize, SerializeSeq, Serializer};
use std::alloc::{Allocator, Global};

pub struct StringSetVisitor<H> {
    marker: PhantomData<fn() -> StringSet<H, Global>>,
}

impl<H> StringSetVisitor<H>
where
    H: BuildHasher,
{
    fn new() -> Self {
        StringSetVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, H> Visitor<'de> for StringSetVisitor<H>
where
    H: BuildHasher + Default,
{
    type Value = StringSet<H, Global>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a StringSet")
    }

    fn visit_seq<S>(self, mut access: S) -> Result<Self::Value, S::Error>
    where
        S: SeqAccess<'de>,
    {
        let size = access.size_hint().unwrap_or(4);
        let mut set = StringSet::with_capacity_and_hasher(size, Default::default());

        while let Some(key) = access.next_element::<Vec<u8>>()? {
            set.insert(&key);
        }

        Ok(set)
    }
}

impl<'de, H> Deserialize<'de> for StringSet<H, Global>
where
    H: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(StringSetVisitor::<H>::new())
    }
}

impl<H, A> Serialize for StringSet<H, A>
where
    H: BuildHasher,
    A: Allocator,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;

        for key in self.iter() {
            seq.serialize_element(key)?;
        }

        seq.end()
    }
}

#[cfg(test)]
mod test {
    use crate::StringSet;

    #[test]
    fn stringset_serde() {
        let mut set = StringSet::new();

        set.insert(b"zero");
        set.insert(b"one");
        set.insert(b"two");
        set.insert(b"three");
        set.insert(b"");

        let serialized = serde_json::to_string(&set).expect("Couldn't serialize set");
        let deserialized: StringSet =
            serde_json::from_str(&serialized).expect("Couldn't deserialize set");

        assert_eq!(deserialized.len(), 5);
        assert!(deserialized.contains(b"zero"));
        assert!(deserialized.contains(b"one"));
        assert!(deserialized.contains(b"two"));
        assert!(deserialized.contains(b"three"));
        assert!(deserialized.contains(b""));
    }
}
