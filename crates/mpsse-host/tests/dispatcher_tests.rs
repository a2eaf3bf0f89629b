use std::sync::Arc;

use mpsse_host::session::engine::freq;
use mpsse_host::session::{
    CallError, Endianness, Engine, Failure, Mode, OpenParams, SessionRegistry,
    Status,
};
use mpsse_host::{Dispatcher, IoData, Loopback};
use tokio::runtime::Handle;

const SPI0: i64 = Mode::Spi0 as i64;
const MSB: i64 = Endianness::Msb as i64;
const ONE_MHZ: i64 = freq::ONE_MHZ as i64;

fn dispatcher() -> Dispatcher<Loopback> {
    Dispatcher::with_registry(
        Loopback::new(),
        Handle::current(),
        Arc::new(SessionRegistry::new()),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn spi_transaction_round_trip() {
    let d = dispatcher();
    let before = d.registry().live();

    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    assert_eq!(d.registry().live(), before + 1);

    d.start(&h).await.unwrap();
    d.write(&h, [0xAAu8, 0xBB]).await.unwrap();
    assert_eq!(d.read(&h, 2).await.unwrap(), vec![0xAAu8, 0xBB]);
    d.close(&h).await.unwrap();

    assert_eq!(d.registry().live(), before);
    assert_eq!(d.engine().closed(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_open_leaves_count_unchanged() {
    let d = dispatcher();

    d.engine().fail_next_open();
    let result = d.open(SPI0, ONE_MHZ, MSB).await;
    assert_eq!(result.unwrap_err(), CallError::Failed(Failure::Generic));

    // Engine-side validation also surfaces as a plain failure.
    let result = d.open(99, ONE_MHZ, MSB).await;
    assert_eq!(result.unwrap_err(), CallError::Failed(Failure::Generic));

    assert_eq!(d.registry().live(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_range_open_arguments_are_bad_arguments() {
    let d = dispatcher();

    let too_fast = d.open(SPI0, i64::from(i32::MAX) + 1, MSB).await;
    let bad_mode = d.open(i64::MIN, ONE_MHZ, MSB).await;
    assert_eq!(too_fast.unwrap_err(), CallError::BadArgument);
    assert_eq!(bad_mode.unwrap_err(), CallError::BadArgument);
    assert_eq!(d.engine().opened(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_idempotent() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();

    assert!(d.close(&h).await.is_ok());
    assert!(d.close(&h).await.is_ok());
    assert_eq!(d.registry().live(), 0);
    assert_eq!(d.engine().closed(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_session_is_reclaimed() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    assert_eq!(d.registry().live(), 1);

    drop(h);
    assert_eq!(d.registry().live(), 0);
    assert_eq!(d.engine().closed(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_on_shared_handle_then_last_drop_releases_once() {
    let d = dispatcher();

    for _ in 0..20 {
        let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
        let closer = {
            let d = d.clone();
            let h = h.clone();
            tokio::spawn(async move { d.close(&h).await })
        };
        drop(h);
        closer.await.unwrap().unwrap();
    }

    assert_eq!(d.registry().live(), 0);
    assert_eq!(d.engine().closed(), 20);
}

#[tokio::test(flavor = "multi_thread")]
async fn detached_release_closes_session() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();

    d.release_detached(h.clone());
    drop(h);

    for _ in 0..100 {
        if d.engine().closed() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(d.engine().closed(), 1);
    assert_eq!(d.registry().live(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_then_start_reuses_session() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();

    d.start(&h).await.unwrap();
    d.stop(&h).await.unwrap();
    d.start(&h).await.unwrap();
    d.write(&h, vec![0x01u8]).await.unwrap();
    assert_eq!(d.read(&h, 1).await.unwrap(), vec![0x01u8]);
    d.close(&h).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_length_read_is_empty_success() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    d.start(&h).await.unwrap();

    assert_eq!(d.read(&h, 0).await.unwrap(), Vec::<u8>::new());
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_read_failure_is_reported() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    d.start(&h).await.unwrap();
    d.write(&h, [1u8]).await.unwrap();

    // Loopback only holds one byte.
    let result = d.read(&h, 4).await;
    assert_eq!(result.unwrap_err(), CallError::Failed(Failure::Generic));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_read_is_bad_argument() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();

    let result = d.read(&h, u64::from(u32::MAX)).await;
    assert_eq!(result.unwrap_err(), CallError::BadArgument);
}

#[tokio::test(flavor = "multi_thread")]
async fn write_accepts_nested_byte_data() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    d.start(&h).await.unwrap();

    let data = IoData::List(vec![
        IoData::Byte(0x10),
        IoData::List(vec![IoData::Bytes(vec![0x20, 0x30])]),
    ]);
    d.write(&h, data).await.unwrap();
    assert_eq!(d.read(&h, 3).await.unwrap(), vec![0x10, 0x20, 0x30]);

    let bad = IoData::List(vec![IoData::Byte(300)]);
    assert_eq!(d.write(&h, bad).await.unwrap_err(), CallError::BadArgument);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_ack_reports_engine_state() {
    let d = dispatcher();
    let h = d.open(Mode::I2c as i64, freq::FOUR_HUNDRED_KHZ as i64, MSB)
        .await
        .unwrap();

    assert_eq!(d.get_ack(&h).await.unwrap(), 0);
    d.engine().set_ack(1);
    assert_eq!(d.get_ack(&h).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_session_fails_every_operation() {
    let d = dispatcher();
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    d.close(&h).await.unwrap();

    let failed = CallError::Failed(Failure::Generic);
    assert_eq!(d.start(&h).await.unwrap_err(), failed);
    assert_eq!(d.stop(&h).await.unwrap_err(), failed);
    assert_eq!(d.write(&h, [1u8]).await.unwrap_err(), failed);
    assert_eq!(d.read(&h, 1).await.unwrap_err(), failed);
    assert_eq!(d.read(&h, 0).await.unwrap_err(), failed);
    assert_eq!(d.get_ack(&h).await.unwrap_err(), failed);
    assert_eq!(d.registry().live(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn sessions_run_independently() {
    let d = dispatcher();
    let a = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    let b = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    d.start(&a).await.unwrap();
    d.start(&b).await.unwrap();

    let (wa, wb) = tokio::join!(d.write(&a, [0xAu8]), d.write(&b, [0xBu8]));
    wa.unwrap();
    wb.unwrap();
    assert_eq!(d.read(&a, 1).await.unwrap(), vec![0xAu8]);
    assert_eq!(d.read(&b, 1).await.unwrap(), vec![0xBu8]);

    d.close(&a).await.unwrap();
    assert_eq!(d.registry().live(), 1);
    assert_eq!(d.read(&b, 0).await.unwrap(), Vec::<u8>::new());
}

// ---------------------------------------------------------------------------
// Misbehaving engine
// ---------------------------------------------------------------------------

/// Engine whose transfers panic and whose reads come back short.
struct Faulty {
    panic_on_close: bool,
}

impl Engine for Faulty {
    type Context = ();
    type Buffer = Vec<u8>;

    fn open(&self, _params: OpenParams) -> Option<Self::Context> {
        Some(())
    }

    fn close(&self, _context: Self::Context) {
        if self.panic_on_close {
            panic!("close blew up");
        }
    }

    fn start(&self, _context: &Self::Context) -> Status {
        panic!("engine blew up");
    }

    fn stop(&self, _context: &Self::Context) -> Status {
        Status::Fail
    }

    fn write(&self, _context: &Self::Context, _data: &[u8]) -> Status {
        Status::Ok
    }

    fn read(
        &self,
        _context: &Self::Context,
        length: usize,
    ) -> Option<Self::Buffer> {
        Some(vec![0; length / 2])
    }

    fn get_ack(&self, _context: &Self::Context) -> i32 {
        0
    }
}

fn faulty(panic_on_close: bool) -> Dispatcher<Faulty> {
    Dispatcher::with_registry(
        Faulty { panic_on_close },
        Handle::current(),
        Arc::new(SessionRegistry::new()),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_faults_become_failures() {
    let d = faulty(false);
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();
    let failed = CallError::Failed(Failure::Generic);

    assert_eq!(d.start(&h).await.unwrap_err(), failed);
    assert_eq!(d.stop(&h).await.unwrap_err(), failed);
    assert_eq!(d.read(&h, 4).await.unwrap_err(), failed);

    // The panic did not poison the session.
    d.write(&h, [1u8]).await.unwrap();
    d.close(&h).await.unwrap();
    assert_eq!(d.registry().live(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_close_still_releases_session() {
    let d = faulty(true);
    let h = d.open(SPI0, ONE_MHZ, MSB).await.unwrap();

    let first = d.close(&h).await;
    assert_eq!(first.unwrap_err(), CallError::Failed(Failure::Generic));
    assert!(!h.is_live());
    assert_eq!(d.registry().live(), 0);

    d.close(&h).await.unwrap();
    drop(h);
    assert!(d.registry().ensure_idle().is_ok());
}
