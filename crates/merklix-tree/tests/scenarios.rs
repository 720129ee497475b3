//! Hand-computed tree shapes over single-byte keys.
//!
//! Keys `0x00, 0x40, 0xC0, 0xD0, 0x80` differ within their top nibble,
//! which pins every grow/ungrow shape: `0xC0` and `0xD0` share three
//! leading bits, `0x80` fills the dead end their growth leaves behind.

use std::path::PathBuf;
use std::sync::Arc;

use merklix_store::{MemFs, OpenMode, Vfs};
use merklix_tree::{Config, Tree, Verdict};
use merklix_types::{Digest, Hasher, Sha256Hasher};

const KEY_A: [u8; 1] = [0x00];
const KEY_B: [u8; 1] = [0xC0];
const KEY_C: [u8; 1] = [0xD0];
const KEY_D: [u8; 1] = [0x80];

fn config(fs: &Arc<MemFs>, prefix: &str) -> Config {
    Config {
        hasher: Arc::new(Sha256Hasher),
        bits: 8,
        prefix: PathBuf::from(prefix),
        standalone: true,
        vfs: fs.clone(),
        eviction_seed: Some(1),
    }
}

fn open(fs: &Arc<MemFs>, prefix: &str) -> Tree {
    Tree::open(config(fs, prefix)).unwrap()
}

fn leaf(key: &[u8], value: &[u8]) -> Digest {
    Sha256Hasher.digest_leaf(key, value)
}

fn pair(left: &Digest, right: &Digest) -> Digest {
    Sha256Hasher.digest_pair(left, right)
}

#[test]
fn single_leaf_root_is_the_leaf_hash() {
    // S1: one leaf sits directly at the root, no internal levels.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s1");
    tree.insert(&KEY_A, b"a").unwrap();
    let root = tree.commit().unwrap();
    assert_eq!(root, leaf(&KEY_A, b"a"));

    let proof = tree.prove(&root, &KEY_A).unwrap();
    assert_eq!(
        tree.verify(&root, &KEY_A, &proof),
        Verdict::Inclusion(b"a".to_vec())
    );
}

#[test]
fn two_leaves_split_at_depth_one() {
    // S2: 0x00 and 0xC0 disagree at bit 0.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s2");
    tree.insert(&KEY_A, b"a").unwrap();
    tree.insert(&KEY_B, b"b").unwrap();
    let root = tree.commit().unwrap();
    assert_eq!(root, pair(&leaf(&KEY_A, b"a"), &leaf(&KEY_B, b"b")));
}

#[test]
fn colliding_prefix_grows_with_dead_ends() {
    // S3: 0xC0 = 1100…, 0xD0 = 1101… share three leading bits, so the
    // right subtree grows to depth 4 with dead ends at depths 2 and 3.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s3");
    tree.insert(&KEY_A, b"a").unwrap();
    tree.insert(&KEY_B, b"b").unwrap();
    tree.insert(&KEY_C, b"c").unwrap();
    let root = tree.commit().unwrap();

    let bottom = pair(&leaf(&KEY_B, b"b"), &leaf(&KEY_C, b"c"));
    let depth2 = pair(&bottom, &Digest::ZERO);
    let depth1 = pair(&Digest::ZERO, &depth2);
    assert_eq!(root, pair(&leaf(&KEY_A, b"a"), &depth1));

    // The dead ends compress out of proofs: proving 0xC0 crosses four
    // levels but carries only two real siblings.
    let proof = tree.prove(&root, &KEY_B).unwrap();
    assert_eq!(
        tree.verify(&root, &KEY_B, &proof),
        Verdict::Inclusion(b"b".to_vec())
    );

    // A key diverging into a dead end gets a compact exclusion proof.
    let proof = tree.prove(&root, &KEY_D).unwrap();
    assert_eq!(tree.verify(&root, &KEY_D, &proof), Verdict::Exclusion);
}

#[test]
fn insert_fills_a_dead_end() {
    // S4: 0x80 = 1000… descends right then left, exactly into the dead
    // end the previous growth created at depth 2.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s4");
    tree.insert(&KEY_A, b"a").unwrap();
    tree.insert(&KEY_B, b"b").unwrap();
    tree.insert(&KEY_C, b"c").unwrap();
    tree.insert(&KEY_D, b"d").unwrap();
    let root = tree.commit().unwrap();

    let bottom = pair(&leaf(&KEY_B, b"b"), &leaf(&KEY_C, b"c"));
    let depth2 = pair(&bottom, &Digest::ZERO);
    let depth1 = pair(&leaf(&KEY_D, b"d"), &depth2);
    assert_eq!(root, pair(&leaf(&KEY_A, b"a"), &depth1));
}

#[test]
fn removals_ungrow_back_to_the_two_leaf_root() {
    // S5: removing 0x80 and 0xD0 collapses every grown level; the root
    // hash equals the two-leaf root exactly.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s5");
    tree.insert(&KEY_A, b"a").unwrap();
    tree.insert(&KEY_B, b"b").unwrap();
    let two_leaf_root = tree.root_hash();

    tree.insert(&KEY_C, b"c").unwrap();
    tree.insert(&KEY_D, b"d").unwrap();
    tree.remove(&KEY_D).unwrap();
    tree.remove(&KEY_C).unwrap();
    assert_eq!(tree.root_hash(), two_leaf_root);

    let root = tree.commit().unwrap();
    assert_eq!(root, pair(&leaf(&KEY_A, b"a"), &leaf(&KEY_B, b"b")));
}

#[test]
fn crash_mid_record_recovers_the_previous_commit() {
    // S6: truncating inside the second commit's records rolls back to
    // the first commit; redoing the insert reproduces the same root.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/s6");
    tree.insert(&KEY_A, b"a").unwrap();
    let first_root = tree.commit().unwrap();

    let file_path = PathBuf::from("/s6/0000000001");
    let clean_len = {
        let file = fs.open(&file_path, OpenMode::Read).unwrap();
        file.len().unwrap()
    };

    tree.insert(&KEY_B, b"b").unwrap();
    let second_root = tree.commit().unwrap();
    tree.close().unwrap();

    // Chop mid-way through the second commit's bytes.
    let file = fs.open(&file_path, OpenMode::ReadWrite).unwrap();
    file.truncate(clean_len + 21).unwrap();
    drop(file);

    let mut tree = open(&fs, "/s6");
    assert_eq!(tree.root_hash(), first_root);
    assert_eq!(tree.get(&KEY_B).unwrap(), None);

    tree.insert(&KEY_B, b"b").unwrap();
    assert_eq!(tree.commit().unwrap(), second_root);
    assert_eq!(tree.get(&KEY_B).unwrap(), Some(b"b".to_vec()));
}

#[test]
fn historical_roots_stay_provable() {
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/hist");
    tree.insert(&KEY_A, b"a").unwrap();
    let first = tree.commit().unwrap();
    tree.insert(&KEY_B, b"b").unwrap();
    let second = tree.commit().unwrap();

    // Prove 0xC0 against both roots: absent in the first, present in
    // the second.
    let proof = tree.prove(&first, &KEY_B).unwrap();
    assert_eq!(tree.verify(&first, &KEY_B, &proof), Verdict::Exclusion);
    let proof = tree.prove(&second, &KEY_B).unwrap();
    assert_eq!(
        tree.verify(&second, &KEY_B, &proof),
        Verdict::Inclusion(b"b".to_vec())
    );

    // A proof against one root does not verify against the other.
    assert_eq!(
        tree.verify(&first, &KEY_B, &proof),
        Verdict::MismatchedRoot
    );
}

#[test]
fn collision_proof_reveals_the_other_leaf() {
    // With only 0xC0 present, proving 0xD0 lands on 0xC0's leaf: the
    // exclusion reveals the colliding key and value.
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/coll");
    tree.insert(&KEY_B, b"b").unwrap();
    let root = tree.commit().unwrap();

    let proof = tree.prove(&root, &KEY_C).unwrap();
    assert_eq!(tree.verify(&root, &KEY_C, &proof), Verdict::Exclusion);
    // The same bytes presented for 0xC0 itself are a SameKey forgery.
    assert_eq!(tree.verify(&root, &KEY_B, &proof), Verdict::SameKey);
}

#[test]
fn empty_commit_is_provably_empty() {
    let fs = Arc::new(MemFs::new());
    let mut tree = open(&fs, "/empty");
    let root = tree.commit().unwrap();
    assert_eq!(root, Digest::ZERO);
    let proof = tree.prove(&root, &KEY_A).unwrap();
    assert_eq!(tree.verify(&root, &KEY_A, &proof), Verdict::Exclusion);
}
