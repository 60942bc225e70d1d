//! End-to-end campaigns against stand-in `xdsdfu`/`dslite` scripts.
//!
//! The fake `dslite` decides its outcome from the ccxml name it is given:
//! serials containing `FAIL` report a lock error, `SLOW` sleeps before
//! succeeding, anything else succeeds. It also records its arguments next to
//! the ccxml.

#![cfg(unix)]

use multiflash::flasher::{ChannelStatus, Error, Orchestrator, SettingsBuilder};
use serial_test::serial;
use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<configurations XML_version="1.2" id="configurations_0">
    <configuration XML_version="1.2" id="Texas Instruments XDS110 USB Debug Probe_0">
        <connection XML_version="1.2" id="Texas Instruments XDS110 USB Debug Probe_0">
            <property Type="choicelist" Value="1" id="Debug Probe Selection">
                <choice Name="Select by serial number" value="0">
                    <property Type="stringfield" Value="" id="-- Enter the serial number"/>
                </choice>
            </property>
        </connection>
    </configuration>
</configurations>
"#;

const FAKE_DSLITE: &str = r#"#!/bin/sh
cfg=""
prev=""
for a in "$@"; do
    if [ "$prev" = "-c" ]; then cfg="$a"; fi
    prev="$a"
done
printf '%s\n' "$@" > "$cfg.args"
case "$cfg" in
    *FAIL*)
        echo "Loading Program: image.out"
        echo "Error connecting to the target: device is locked"
        exit 1
        ;;
    *SLOW*)
        sleep 2
        echo "Success"
        ;;
    *)
        echo "Loading Program: image.out"
        echo "Finished: 100%"
        echo "Success"
        ;;
esac
"#;

struct Bench {
    dir: tempfile::TempDir,
}

impl Bench {
    fn new(serials: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let mut scanner = String::from("#!/bin/sh\necho \"Scanning USB buses for supported XDS110 devices...\"\n");
        for (i, serial) in serials.iter().enumerate() {
            scanner.push_str(&format!(
                "echo \"<<<< Device {i} >>>>\"\necho \"Serial Num:   {serial}\"\n"
            ));
        }
        write_script(&bin.join("xdsdfu"), &scanner);
        write_script(&bin.join("dslite"), FAKE_DSLITE);

        std::fs::write(dir.path().join("master.ccxml"), TEMPLATE).unwrap();
        std::fs::create_dir_all(dir.path().join("image")).unwrap();
        std::fs::write(dir.path().join("image").join("app.out"), b"\x7fELF").unwrap();

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn builder(&self) -> SettingsBuilder {
        let root = self.path();
        SettingsBuilder::new()
            .flash_tool(root.join("bin").join("dslite"))
            .scanner_tool(root.join("bin").join("xdsdfu"))
            .master_template(root.join("master.ccxml"))
            .generated_dir(root.join("generated"))
            .output_dir(root.join("out"))
            .image_dir(root.join("image"))
            .target_image(root.join("image").join("app.out"))
            .credential_file(root.join("password.txt"))
            .spawn_stagger(Duration::from_millis(10))
            .flash_timeout(Duration::from_secs(20))
    }

    fn orchestrator(&self, max_flash_count: u32) -> Orchestrator {
        Orchestrator::new(self.builder().max_flash_count(max_flash_count).build().unwrap())
            .unwrap()
    }

    fn sink(&self, channel: u8) -> PathBuf {
        self.path().join("out").join(format!("flash_channel_{channel}.txt"))
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn campaign_classifies_each_channel() {
    let bench = Bench::new(&["AAA111", "FAIL22", "CCC333"]);
    let orchestrator = bench.orchestrator(10);

    let report = orchestrator.scan_devices().await.unwrap();
    assert_eq!(report.serials, vec!["AAA111", "FAIL22", "CCC333"]);
    assert_eq!(report.configured_count, 3);
    assert_eq!(orchestrator.status().num_channels, 3);

    let campaign = orchestrator.start_all(false).unwrap();
    assert_eq!(campaign.started, vec![1, 2, 3]);
    assert!(orchestrator.status().is_running);
    orchestrator.wait_workers().await;

    let status = orchestrator.status();
    assert!(!status.is_running);
    assert_eq!(status.channel(1).unwrap().status, ChannelStatus::Success);
    assert!(matches!(
        status.channel(2).unwrap().status,
        ChannelStatus::Failure { .. }
    ));
    assert_eq!(status.channel(3).unwrap().status, ChannelStatus::Success);
    assert_eq!(status.total_success, 2);
    assert_eq!(status.total_fail, 1);

    let output = std::fs::read_to_string(bench.sink(2)).unwrap();
    assert!(output.contains("device is locked"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn cap_is_checked_at_start_only() {
    let bench = Bench::new(&["AAA111", "BBB222"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();

    orchestrator.start_all(false).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().total_success, 2);

    // 2 < 3, so the second campaign starts and overshoots the cap.
    orchestrator.start_all(false).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().total_success, 4);

    let err = orchestrator.start_all(false).unwrap_err();
    assert!(matches!(err, Error::CapReached { max: 3 }));
    let err = orchestrator.start_channel(1, false).unwrap_err();
    assert!(matches!(err, Error::CapReached { max: 3 }));

    orchestrator.reset_counters();
    orchestrator.start_channel(1, false).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().total_success, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn stopped_channel_ignores_late_success() {
    let bench = Bench::new(&["SLOW01"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();

    orchestrator.start_channel(1, false).unwrap();
    let err = orchestrator.start_channel(1, false).unwrap_err();
    assert!(matches!(err, Error::AlreadyInProgress { channel: 1 }));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(orchestrator.stop_all(), "Stopped 1 channel(s)");

    let status = orchestrator.status();
    assert!(!status.is_running);
    assert_eq!(status.channel(1).unwrap().status, ChannelStatus::Terminated);

    orchestrator.wait_workers().await;
    let status = orchestrator.status();
    assert_eq!(status.channel(1).unwrap().status, ChannelStatus::Terminated);
    assert_eq!(status.total_success, 0);
    assert_eq!(status.total_fail, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn secure_mode_passes_lock_directives_and_credentials() {
    let bench = Bench::new(&["AAA111"]);
    let credentials: Vec<String> = (1..=8)
        .map(|i| format!("DcsmZ1Password{i}=0x{i:08X}"))
        .collect();
    std::fs::write(
        bench.path().join("password.txt"),
        format!("{}\n\n", credentials.join("\n")),
    )
    .unwrap();

    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();
    orchestrator.start_channel(1, true).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().channel(1).unwrap().status, ChannelStatus::Success);

    let artifact = orchestrator.status().channel(1).unwrap().config_artifact.clone().unwrap();
    let mut args_file = artifact.into_os_string();
    args_file.push(".args");
    let args = std::fs::read_to_string(args_file).unwrap();
    let args: Vec<&str> = args.lines().collect();

    assert_eq!(&args[..2], ["flash", "-c"]);
    assert_eq!(&args[3..6], ["-e", "-f", "-v"]);
    let z1 = ["-b", "Z1Unlock", "-a", "Z1Unlock", "-a", "Z1PasswordProgram", "-a", "Z1GRABEXEONLYProgram"];
    assert!(args.windows(z1.len()).any(|w| w == z1));

    let tail: Vec<&str> = args[args.len() - 16..]
        .chunks(2)
        .map(|pair| {
            assert_eq!(pair[0], "-s");
            pair[1]
        })
        .collect();
    assert_eq!(tail, credentials);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn secure_mode_without_credentials_fails_the_channel() {
    let bench = Bench::new(&["AAA111"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();

    orchestrator.start_channel(1, true).unwrap();
    orchestrator.wait_workers().await;

    let status = orchestrator.status();
    assert!(matches!(
        status.channel(1).unwrap().status,
        ChannelStatus::ConfigError { .. }
    ));
    assert!(!bench.sink(1).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn missing_artifact_is_config_error_others_proceed() {
    let bench = Bench::new(&["AAA111", "BBB222"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();

    let artifact = orchestrator.status().channel(2).unwrap().config_artifact.clone().unwrap();
    std::fs::remove_file(artifact).unwrap();

    let campaign = orchestrator.start_all(false).unwrap();
    assert_eq!(campaign.started, vec![1]);
    assert_eq!(campaign.config_errors, vec![2]);
    orchestrator.wait_workers().await;

    let status = orchestrator.status();
    assert_eq!(status.channel(1).unwrap().status, ChannelStatus::Success);
    assert!(matches!(
        status.channel(2).unwrap().status,
        ChannelStatus::ConfigError { .. }
    ));
    assert_eq!(status.channel(2).unwrap().fail_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn rescan_replaces_artifacts() {
    let bench = Bench::new(&["AAA111", "BBB222"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();

    write_script(
        &bench.path().join("bin").join("xdsdfu"),
        "#!/bin/sh\necho \"Serial Num: CCC333\"\n",
    );
    let report = orchestrator.scan_devices().await.unwrap();
    assert_eq!(report.serials, vec!["CCC333"]);

    let mut files: Vec<String> = std::fs::read_dir(bench.path().join("generated"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".ccxml"))
        .collect();
    files.sort();
    assert_eq!(files, vec!["channel_1_serial_CCC333.ccxml"]);
    assert_eq!(orchestrator.status().num_channels, 1);
}

#[tokio::test]
#[serial]
async fn missing_scanner_is_reported() {
    let bench = Bench::new(&[]);
    let settings = bench
        .builder()
        .scanner_tool(bench.path().join("bin").join("no-xdsdfu"))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(settings).unwrap();

    let err = orchestrator.scan_devices().await.unwrap_err();
    assert!(matches!(err, Error::ScannerToolMissing { .. }));
}

#[tokio::test]
#[serial]
async fn no_probes_keeps_channel_count() {
    let bench = Bench::new(&[]);
    let orchestrator = Orchestrator::new(bench.builder().num_channels(2).build().unwrap()).unwrap();

    let report = orchestrator.scan_devices().await.unwrap();
    assert_eq!(report.count(), 0);
    assert_eq!(orchestrator.status().num_channels, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn starts_are_refused_while_a_rescan_replaces_artifacts() {
    let bench = Bench::new(&["AAA111"]);
    let orchestrator = bench.orchestrator(3);
    orchestrator.scan_devices().await.unwrap();
    let old_artifact = orchestrator.status().channel(1).unwrap().config_artifact.clone().unwrap();

    write_script(
        &bench.path().join("bin").join("xdsdfu"),
        "#!/bin/sh\nsleep 1\necho \"Serial Num: BBB222\"\n",
    );
    let (report, (single, campaign)) = tokio::join!(orchestrator.scan_devices(), async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        (
            orchestrator.start_channel(1, false),
            orchestrator.start_all(false),
        )
    });

    assert!(matches!(single, Err(Error::ScanInProgress)));
    assert!(matches!(campaign, Err(Error::ScanInProgress)));
    assert_eq!(report.unwrap().serials, vec!["BBB222"]);

    let status = orchestrator.status();
    let channel = status.channel(1).unwrap();
    assert_eq!(channel.status, ChannelStatus::NotStarted);
    assert_eq!(channel.fail_count, 0);
    assert_eq!(channel.serial.as_deref(), Some("BBB222"));
    assert!(!old_artifact.exists());

    orchestrator.start_channel(1, false).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().channel(1).unwrap().status, ChannelStatus::Success);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn timed_out_flash_is_killed_and_counted_as_failure() {
    let bench = Bench::new(&["SLOW01"]);
    let settings = bench
        .builder()
        .flash_timeout(Duration::from_secs(1))
        .max_flash_count(3)
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(settings).unwrap();
    orchestrator.scan_devices().await.unwrap();

    orchestrator.start_channel(1, false).unwrap();
    orchestrator.wait_workers().await;

    let status = orchestrator.status();
    let channel = status.channel(1).unwrap();
    match &channel.status {
        ChannelStatus::Failure { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected a failure, got {other:?}"),
    }
    assert_eq!(channel.fail_count, 1);
    assert_eq!(status.total_success, 0);
    assert!(!status.is_running);

    // The killed tool never gets to report its late success.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let output = std::fs::read_to_string(bench.sink(1)).unwrap();
    assert!(!output.contains("Success"), "{output}");
    assert_eq!(orchestrator.status().total_success, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn hung_scanner_times_out_and_keeps_previous_binding() {
    let bench = Bench::new(&["AAA111"]);
    let settings = bench
        .builder()
        .scan_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(settings).unwrap();
    orchestrator.scan_devices().await.unwrap();

    write_script(
        &bench.path().join("bin").join("xdsdfu"),
        "#!/bin/sh\nsleep 5\necho \"Serial Num: BBB222\"\n",
    );
    let clock = std::time::Instant::now();
    let err = orchestrator.scan_devices().await.unwrap_err();
    assert!(matches!(err, Error::ScanTimeout { secs: 1 }));
    assert!(clock.elapsed() < Duration::from_secs(4));

    let status = orchestrator.status();
    let channel = status.channel(1).unwrap();
    assert_eq!(channel.serial.as_deref(), Some("AAA111"));
    assert!(channel.config_artifact.as_ref().unwrap().is_file());

    orchestrator.start_channel(1, false).unwrap();
    orchestrator.wait_workers().await;
    assert_eq!(orchestrator.status().channel(1).unwrap().status, ChannelStatus::Success);
}
