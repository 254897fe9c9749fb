use std::{collections::BTreeMap, sync::Arc, time::Duration};

use common::{
    apps,
    partition::partition_for,
    store::{output_name, BlobStore, FsStore},
    Assignment, ReportOutcome, WorkerState,
};
use coordinator::{build_router, monitor, AppState, JobState};
use tokio::{
    net::TcpListener,
    sync::{oneshot, watch},
    time::timeout,
};
use worker::{CoordinatorClient, StopReason, Worker};

const INPUTS: [(&str, &str); 3] = [
    ("pg-0.txt", "el perro y el gato\nel perro ladra"),
    ("pg-1.txt", "un gato, dos gatos; tres perros!"),
    ("pg-2.txt", "ladra ladra el perro"),
];
const REDUCE: u32 = 2;

async fn start_coordinator(lease: Duration) -> (String, AppState) {
    let inputs = INPUTS.iter().map(|(name, _)| name.to_string()).collect();
    let state = AppState::new(JobState::new("e2e", inputs, REDUCE, lease));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    tokio::spawn(monitor::run_until_done(
        state.clone(),
        Duration::from_millis(20),
        Duration::ZERO,
    ));

    (format!("http://{addr}"), state)
}

fn client(url: &str) -> CoordinatorClient {
    CoordinatorClient::new(url, Duration::from_secs(2), 3, Duration::from_millis(10)).unwrap()
}

fn new_worker(url: &str, store: Arc<dyn BlobStore>) -> Worker {
    worker_with_poll_limit(url, store, 5)
}

fn worker_with_poll_limit(url: &str, store: Arc<dyn BlobStore>, max_poll_failures: u32) -> Worker {
    Worker::new(
        client(url),
        store,
        apps::named("wc").unwrap(),
        Duration::from_millis(20),
        max_poll_failures,
    )
}

fn seeded_store() -> (tempfile::TempDir, Arc<FsStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::new(dir.path()));
    for (name, text) in INPUTS {
        store.write(name, text.as_bytes()).unwrap();
    }
    (dir, store)
}

/// Conteo de palabras hecho de corrido, sin coordinador.
fn sequential_counts() -> BTreeMap<String, String> {
    let wc = apps::named("wc").unwrap();
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, text) in INPUTS {
        for kv in (wc.map_fn)(name, text) {
            grouped.entry(kv.key).or_default().push(kv.value);
        }
    }
    grouped
        .into_iter()
        .map(|(k, vs)| {
            let out = (wc.reduce_fn)(&k, &vs);
            (k, out)
        })
        .collect()
}

/// Junta todos los `mr-out-*`; cada clave aparece en un solo archivo, el de
/// su partición.
fn read_outputs(store: &FsStore) -> BTreeMap<String, String> {
    let mut all = BTreeMap::new();
    for r in 0..REDUCE {
        let raw = store.read(&output_name(r)).unwrap();
        for line in String::from_utf8(raw).unwrap().lines() {
            let (key, value) = line.split_once(' ').unwrap();
            assert_eq!(partition_for(key, REDUCE), r, "clave {key} en archivo equivocado");
            assert!(
                all.insert(key.to_string(), value.to_string()).is_none(),
                "clave {key} repetida"
            );
        }
    }
    all
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dos_workers_producen_el_mismo_conteo_que_una_corrida_secuencial() {
    let (_dir, store) = seeded_store();
    let (url, state) = start_coordinator(Duration::from_secs(10)).await;
    let (_stop_tx, stop_rx) = watch::channel(false);

    let a = new_worker(&url, store.clone());
    let b = new_worker(&url, store.clone());

    let (ra, rb) = timeout(Duration::from_secs(20), async {
        tokio::join!(a.run("nodo-a", stop_rx.clone()), b.run("nodo-b", stop_rx.clone()))
    })
    .await
    .expect("los workers no terminaron");

    assert_eq!(ra.unwrap(), StopReason::Exit);
    assert_eq!(rb.unwrap(), StopReason::Exit);

    let progress = state.progress();
    assert!(progress.done);
    assert_eq!(progress.map.completed, 3);
    assert_eq!(progress.reduce.completed, REDUCE);

    assert_eq!(read_outputs(&store), sequential_counts());
    assert_eq!(read_outputs(&store)["perro"], "3");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn la_tarea_de_un_worker_caido_se_reasigna_y_su_reporte_tardio_no_cuenta() {
    let (_dir, store) = seeded_store();
    let (url, state) = start_coordinator(Duration::from_millis(300)).await;

    // toma el map 0 y desaparece
    let zombie = client(&url);
    let zombie_id = zombie.register("zombie").await.unwrap();
    let Assignment::Map {
        map_index,
        generation,
        ..
    } = zombie.request_task(zombie_id).await.unwrap()
    else {
        panic!("el primer pedido debería ser un map");
    };
    assert_eq!(map_index, 0);

    let (_stop_tx, stop_rx) = watch::channel(false);
    let w = new_worker(&url, store.clone());
    let reason = timeout(Duration::from_secs(20), w.run("sano", stop_rx))
        .await
        .expect("el worker no terminó")
        .unwrap();
    assert_eq!(reason, StopReason::Exit);

    let workers = state.workers();
    let z = workers.iter().find(|s| s.worker_id == zombie_id).unwrap();
    assert_eq!(z.state, WorkerState::Dead);
    assert_eq!(z.tasks_completed, 0);

    // el zombie "termina" tarde: el map ya fue completado por otro
    let outcome = zombie
        .report_map_done(zombie_id, map_index, generation)
        .await
        .unwrap();
    assert_eq!(outcome, ReportOutcome::Duplicate);

    assert_eq!(read_outputs(&store), sequential_counts());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn la_senal_de_corte_detiene_un_worker_que_espera() {
    let (_dir, store) = seeded_store();
    let (url, _state) = start_coordinator(Duration::from_secs(60)).await;

    // tres maps tomados por otros: el worker solo recibe `none`
    let other = client(&url);
    for _ in 0..3 {
        let id = other.register("ocupado").await.unwrap();
        assert!(matches!(
            other.request_task(id).await.unwrap(),
            Assignment::Map { .. }
        ));
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let w = new_worker(&url, store);
    let run = tokio::spawn(async move { w.run("esperando", stop_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(true).unwrap();

    let reason = timeout(Duration::from_secs(5), run)
        .await
        .expect("el worker no paró")
        .unwrap()
        .unwrap();
    assert_eq!(reason, StopReason::Interrupted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn una_entrada_faltante_se_reporta_como_fallo() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::new(dir.path()));
    let (url, state) = start_coordinator(Duration::from_secs(10)).await;

    // ninguna entrada existe en este store: el worker reporta fallo
    let (stop_tx, stop_rx) = watch::channel(false);
    let w = new_worker(&url, store);
    let run = tokio::spawn(async move { w.run("sin-datos", stop_rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), run)
        .await
        .expect("el worker no paró")
        .unwrap()
        .unwrap();

    let workers = state.workers();
    assert_eq!(workers.len(), 1);
    assert!(workers[0].tasks_failed > 0);
    assert_eq!(workers[0].tasks_completed, 0);
    assert_eq!(state.progress().map.completed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn si_el_coordinador_se_cae_el_worker_sale_tras_varios_pedidos_fallidos() {
    let (_dir, store) = seeded_store();
    let inputs = INPUTS.iter().map(|(name, _)| name.to_string()).collect();
    let state = AppState::new(JobState::new("caida", inputs, REDUCE, Duration::from_secs(60)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (down_tx, down_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async move {
                let _ = down_rx.await;
            })
            .await
    });

    // todos los maps ocupados: el worker solo recibe `none` y sigue pidiendo
    let other = client(&url);
    for _ in 0..INPUTS.len() {
        let id = other.register("ocupado").await.unwrap();
        other.request_task(id).await.unwrap();
    }

    let (_stop_tx, stop_rx) = watch::channel(false);
    let w = worker_with_poll_limit(&url, store, 3);
    let run = tokio::spawn(async move { w.run("huerfano", stop_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!run.is_finished());
    down_tx.send(()).unwrap();

    let reason = timeout(Duration::from_secs(10), run)
        .await
        .expect("el worker siguió pidiendo")
        .unwrap()
        .unwrap();
    assert_eq!(reason, StopReason::CoordinatorGone);
}
