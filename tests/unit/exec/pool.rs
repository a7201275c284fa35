use super::*;

fn desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new(width, height, PixelFormat::Rgba8)
}

#[test]
fn acquire_release_acquire_reuses_the_same_allocation() {
    let mut pool = ResourcePool::new();

    let first = pool.acquire(desc(64, 64)).unwrap();
    let id = first.alloc_id();
    pool.release(first);

    let second = pool.acquire(desc(64, 64)).unwrap();
    assert_eq!(second.alloc_id(), id);
    pool.release(second);

    let stats = pool.stats();
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.reused, 1);
}

#[test]
fn distinct_descriptors_never_share_allocations() {
    let mut pool = ResourcePool::new();

    let a = pool.acquire(desc(64, 64)).unwrap();
    pool.release(a);

    let b = pool.acquire(desc(64, 32)).unwrap();
    let c = pool
        .acquire(TextureDesc::new(64, 64, PixelFormat::Rgba16F))
        .unwrap();
    assert_eq!(pool.stats().reused, 0);
    assert_eq!(pool.stats().allocated, 3);
    pool.release(b);
    pool.release(c);
}

#[test]
fn concurrent_acquires_of_one_descriptor_get_distinct_textures() {
    let mut pool = ResourcePool::new();
    let a = pool.acquire(desc(8, 8)).unwrap();
    let b = pool.acquire(desc(8, 8)).unwrap();
    assert_ne!(a.alloc_id(), b.alloc_id());
    assert_eq!(pool.live(), 2);
    pool.release(a);
    pool.release(b);
    assert_eq!(pool.live(), 0);
}

#[test]
fn limit_exhaustion_fails_with_the_descriptor() {
    let mut pool = ResourcePool::with_limit(1);
    let held = pool.acquire(desc(8, 8)).unwrap();
    let err = pool.acquire(desc(16, 16)).unwrap_err();
    assert!(matches!(
        err,
        RenderError::AllocationFailed { desc } if desc.width == 16
    ));
    pool.release(held);
    assert!(pool.acquire(desc(16, 16)).is_ok());
}

#[test]
fn byte_len_follows_format() {
    assert_eq!(desc(4, 2).byte_len(), 32);
    assert_eq!(TextureDesc::new(4, 2, PixelFormat::Rgba16F).byte_len(), 64);
}

#[test]
fn trim_releases_free_textures_but_keeps_identity_fresh() {
    let mut pool = ResourcePool::new();
    let first = pool.acquire(desc(8, 8)).unwrap();
    let id = first.alloc_id();
    pool.release(first);
    pool.trim();

    let second = pool.acquire(desc(8, 8)).unwrap();
    assert_ne!(second.alloc_id(), id);
    pool.release(second);
}
