//! Pedal - host runner
//!
//! Runs the effects pipeline between a cpal input and output stream and
//! takes commands on stdin. The footswitch is emulated with `tap`/`hold`.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pedal_audio::{
    format_param_value, param_info, ButtonEvent, FootswitchQueue, LooperMailbox, PedalConfig,
    Pipeline, SharedParams, CABINET_SLOTS,
};
use pedal_input::{
    parse_command, AmpControl, Command, FootswitchDecoder, LooperStatus, HOLD_THRESHOLD_MS,
};
use pedal_library::{Config, IrLoader, PresetBank, PresetStore};

/// Frames handed to the pipeline per call
const HOST_BLOCK: usize = 256;

/// Input ring capacity in stereo frames
const INPUT_RING_FRAMES: usize = 8192;

/// Footswitch polling interval
const FOOTSWITCH_POLL: Duration = Duration::from_millis(5);

const HELP: &str = "\
chain:    add <effect> | rm <i> | toggle <i> | set <i> <param> <0-100>
amp:      amp model <clean|crunch|lead|blues|metal> | amp <gain|bass|mid|treble|presence|master> <0-1>
cabinet:  cab on|off | cab <slot>
gate:     gate on|off | gate thr <dB> | gate ratio <n>
levels:   in <0-1> | out <0-1> | mix <0-2>
looper:   rec | stop | dub | undo | clear | play | tap | hold
presets:  preset load <slot> | preset save <slot>
misc:     bypass | status | help | quit";

/// Events sent from the audio thread to the console
#[derive(Debug, Clone)]
enum AudioEvent {
    Started {
        sample_rate: u32,
        input_channels: u16,
        output_channels: u16,
    },
    Error(String),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::load();

    let mut pipeline = Pipeline::new(PedalConfig {
        sample_rate: config.sample_rate as f32,
        input_gain: config.input_gain,
        output_level: config.output_level,
        looper_mix: config.looper_mix,
        ..PedalConfig::default()
    });

    if let Some(dir) = config.cabinet_ir_dir.clone() {
        load_cabinet_irs(&mut pipeline, &dir, config.sample_rate);
    }

    let store = match PresetStore::open(&config.preset_db_path()) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "preset store unavailable, presets will not persist");
            None
        }
    };
    let mut bank = match store.as_ref().map(PresetStore::load_bank) {
        Some(Ok(bank)) => bank,
        Some(Err(e)) => {
            warn!(error = %e, "preset store unreadable, using factory presets");
            PresetBank::factory()
        }
        None => PresetBank::factory(),
    };
    if let Some(slot) = config.last_preset {
        if let Err(e) = bank.load(slot, &mut pipeline) {
            warn!(slot, error = %e, "could not restore last preset");
        }
    }

    let params = pipeline.shared_params();
    let mailbox = pipeline.mailbox();
    let pipeline = Arc::new(Mutex::new(pipeline));
    let footswitch = FootswitchQueue::new();
    let clock = Instant::now();

    let shutdown = Arc::new(AtomicBool::new(false));
    let (evt_tx, evt_rx) = crossbeam_channel::bounded(16);

    let audio_handle = {
        let pipeline = pipeline.clone();
        let shutdown = shutdown.clone();
        let config = config.clone();
        thread::spawn(move || run_audio_thread(pipeline, config, evt_tx, shutdown))
    };

    let footswitch_handle = {
        let pipeline = pipeline.clone();
        let footswitch = footswitch.clone();
        let mailbox = mailbox.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || run_footswitch_thread(pipeline, footswitch, mailbox, clock, shutdown))
    };

    let mut console = Console {
        pipeline,
        params,
        mailbox,
        footswitch,
        clock,
        bank,
        store,
        config,
    };
    let result = console.run(&evt_rx);

    shutdown.store(true, Ordering::SeqCst);
    let _ = audio_handle.join();
    let _ = footswitch_handle.join();

    if let Err(e) = console.config.save() {
        warn!(error = %e, "failed to save config");
    }

    result
}

fn load_cabinet_irs(pipeline: &mut Pipeline, dir: &std::path::Path, sample_rate: u32) {
    let loader = IrLoader::with_sample_rate(sample_rate);
    let irs = match loader.load_dir(dir) {
        Ok(irs) => irs,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cabinet IR folder unreadable");
            return;
        }
    };

    for (slot, ir) in irs.iter().take(CABINET_SLOTS).enumerate() {
        match pipeline.cabinet_mut().load_ir(slot, &ir.taps) {
            Ok(()) => info!(slot, name = %ir.name, source_rate = ir.source_rate, "cabinet IR loaded"),
            Err(e) => warn!(slot, name = %ir.name, error = %e, "cabinet IR rejected"),
        }
    }
}

fn find_device<I>(devices: Option<I>, name: Option<&str>, fallback: Option<cpal::Device>) -> Option<cpal::Device>
where
    I: Iterator<Item = cpal::Device>,
{
    let Some(wanted) = name else {
        return fallback;
    };
    let found = devices.and_then(|mut it| it.find(|d| d.name().ok().as_deref() == Some(wanted)));
    if found.is_none() {
        warn!(device = wanted, "device not found, using default");
    }
    found.or(fallback)
}

fn run_audio_thread(
    pipeline: Arc<Mutex<Pipeline>>,
    config: Config,
    evt_tx: Sender<AudioEvent>,
    shutdown: Arc<AtomicBool>,
) {
    let fail = |msg: String| {
        error!("{}", msg);
        let _ = evt_tx.send(AudioEvent::Error(msg));
    };

    let host = cpal::default_host();
    let input = find_device(
        host.input_devices().ok(),
        config.input_device.as_deref(),
        host.default_input_device(),
    );
    let output = find_device(
        host.output_devices().ok(),
        config.output_device.as_deref(),
        host.default_output_device(),
    );
    let (Some(input), Some(output)) = (input, output) else {
        fail("No audio input/output device found".into());
        return;
    };

    let input_channels = match input.default_input_config() {
        Ok(c) => c.channels(),
        Err(e) => return fail(format!("Failed to get input config: {}", e)),
    };
    let output_channels = match output.default_output_config() {
        Ok(c) => c.channels(),
        Err(e) => return fail(format!("Failed to get output config: {}", e)),
    };

    let stream_config = |channels: u16| cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let ring = HeapRb::<f32>::new(INPUT_RING_FRAMES * 2);
    let (mut producer, mut consumer) = ring.split();

    let in_ch = input_channels as usize;
    let input_stream = input.build_input_stream(
        &stream_config(input_channels),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(in_ch) {
                let l = frame[0];
                let r = frame.get(1).copied().unwrap_or(l);
                // Overruns drop the newest frames
                let _ = producer.push_slice(&[l, r]);
            }
        },
        |err| error!("input stream error: {}", err),
        None,
    );

    // Pre-allocated so the output callback never allocates
    let mut interleaved = vec![0.0f32; HOST_BLOCK * 2];
    let mut in_l = vec![0.0f32; HOST_BLOCK];
    let mut in_r = vec![0.0f32; HOST_BLOCK];
    let mut out_l = vec![0.0f32; HOST_BLOCK];
    let mut out_r = vec![0.0f32; HOST_BLOCK];

    let out_ch = output_channels as usize;
    let output_stream = output.build_output_stream(
        &stream_config(output_channels),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for chunk in data.chunks_mut(HOST_BLOCK * out_ch) {
                let frames = chunk.len() / out_ch;

                let got = consumer.pop_slice(&mut interleaved[..frames * 2]);
                interleaved[got..frames * 2].fill(0.0);
                for i in 0..frames {
                    in_l[i] = interleaved[i * 2];
                    in_r[i] = interleaved[i * 2 + 1];
                }

                // Never block the audio callback; output silence on contention
                match pipeline.try_lock() {
                    Some(mut p) => p.process_f32(
                        &in_l[..frames],
                        &in_r[..frames],
                        &mut out_l[..frames],
                        &mut out_r[..frames],
                    ),
                    None => {
                        chunk.fill(0.0);
                        continue;
                    }
                }

                for (i, frame) in chunk.chunks_mut(out_ch).enumerate() {
                    if out_ch == 1 {
                        frame[0] = (out_l[i] + out_r[i]) * 0.5;
                    } else {
                        frame[0] = out_l[i];
                        frame[1] = out_r[i];
                        frame[2..].fill(0.0);
                    }
                }
            }
        },
        |err| error!("output stream error: {}", err),
        None,
    );

    let (input_stream, output_stream) = match (input_stream, output_stream) {
        (Ok(i), Ok(o)) => (i, o),
        (Err(e), _) => return fail(format!("Failed to create input stream: {}", e)),
        (_, Err(e)) => return fail(format!("Failed to create output stream: {}", e)),
    };

    if let Err(e) = input_stream.play().and_then(|_| output_stream.play()) {
        return fail(format!("Failed to start audio: {}", e));
    }

    let _ = evt_tx.send(AudioEvent::Started {
        sample_rate: config.sample_rate,
        input_channels,
        output_channels,
    });

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(20));
    }
    debug!("audio thread stopping");
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}

/// Drains footswitch edges through the gesture decoder into the looper
/// mailbox. Looper state is read under a short lock.
fn run_footswitch_thread(
    pipeline: Arc<Mutex<Pipeline>>,
    queue: FootswitchQueue,
    mailbox: Arc<LooperMailbox>,
    clock: Instant,
    shutdown: Arc<AtomicBool>,
) {
    let mut decoder = FootswitchDecoder::new();
    let status = || LooperStatus::from(pipeline.lock().looper());

    while !shutdown.load(Ordering::Relaxed) {
        while let Some(event) = queue.pop() {
            if let Some(cmd) = decoder.on_event(event, status()) {
                debug!(command = ?cmd, "footswitch");
                mailbox.post(cmd);
            }
        }
        if let Some(cmd) = decoder.tick(elapsed_ms(clock), status()) {
            debug!(command = ?cmd, "footswitch (deferred)");
            mailbox.post(cmd);
        }
        thread::sleep(FOOTSWITCH_POLL);
    }
}

struct Console {
    pipeline: Arc<Mutex<Pipeline>>,
    params: Arc<SharedParams>,
    mailbox: Arc<LooperMailbox>,
    footswitch: FootswitchQueue,
    clock: Instant,
    bank: PresetBank,
    store: Option<PresetStore>,
    config: Config,
}

impl Console {
    /// Read commands until `quit` or end of input, then record the
    /// session's levels and preset in the config.
    fn run(&mut self, events: &Receiver<AudioEvent>) -> anyhow::Result<()> {
        println!("pedal ready - type 'help' for commands");

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            while let Ok(event) = events.try_recv() {
                self.report(event);
            }

            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.execute(cmd),
                Err(e) => println!("error: {}", e),
            }
        }

        self.config.input_gain = self.params.input_gain();
        self.config.output_level = self.params.output_level();
        self.config.looper_mix = self.params.looper_mix();
        self.config.last_preset = self.bank.current_slot();
        Ok(())
    }

    fn report(&self, event: AudioEvent) {
        match event {
            AudioEvent::Started {
                sample_rate,
                input_channels,
                output_channels,
            } => info!(sample_rate, input_channels, output_channels, "audio running"),
            AudioEvent::Error(msg) => println!("audio error: {}", msg),
        }
    }

    fn press(&self, hold_ms: u64) {
        let now = elapsed_ms(self.clock);
        self.footswitch.push(ButtonEvent {
            pressed: true,
            time_ms: now,
        });
        self.footswitch.push(ButtonEvent {
            pressed: false,
            time_ms: now + hold_ms,
        });
    }

    fn execute(&mut self, cmd: Command) {
        let result = match cmd {
            Command::AddEffect(ty) => {
                let mut p = self.pipeline.lock();
                p.chain_mut()
                    .add_effect(ty)
                    .map(|i| println!("added {} at {}", ty.name(), i))
                    .map_err(anyhow::Error::from)
            }
            Command::RemoveEffect(i) => self
                .pipeline
                .lock()
                .chain_mut()
                .remove_effect(i)
                .map_err(anyhow::Error::from),
            Command::ToggleEffect(i) => self
                .pipeline
                .lock()
                .chain_mut()
                .toggle_effect(i)
                .map_err(anyhow::Error::from),
            Command::SetParam {
                index,
                param,
                slider,
            } => {
                let mut p = self.pipeline.lock();
                p.chain_mut()
                    .set_effect_param_slider(index, param, slider)
                    .map(|_| {
                        if let Some(inst) = p.chain().instance(index) {
                            let ty = inst.effect_type();
                            let value = inst.params()[param];
                            println!(
                                "{} {} = {}",
                                inst.name(),
                                param_info(ty, param).name,
                                format_param_value(ty, param, value)
                            );
                        }
                    })
                    .map_err(anyhow::Error::from)
            }
            Command::Amp(control) => {
                let mut p = self.pipeline.lock();
                let amp = p.amp_mut();
                match control {
                    AmpControl::Model(m) => amp.set_model(m),
                    AmpControl::Gain(v) => amp.set_gain(v),
                    AmpControl::Bass(v) => amp.set_bass(v),
                    AmpControl::Mid(v) => amp.set_mid(v),
                    AmpControl::Treble(v) => amp.set_treble(v),
                    AmpControl::Presence(v) => amp.set_presence(v),
                    AmpControl::Master(v) => amp.set_master(v),
                }
                Ok(())
            }
            Command::CabinetEnabled(on) => {
                self.pipeline.lock().cabinet_mut().set_enabled(on);
                Ok(())
            }
            Command::CabinetSelect(slot) => {
                let mut p = self.pipeline.lock();
                p.cabinet_mut()
                    .select(slot)
                    .map(|_| println!("cabinet: {}", p.cabinet().selected_name()))
                    .map_err(anyhow::Error::from)
            }
            Command::GateEnabled(on) => {
                self.pipeline.lock().gate_mut().set_enabled(on);
                Ok(())
            }
            Command::GateThreshold(db) => {
                self.pipeline.lock().gate_mut().set_threshold_db(db);
                Ok(())
            }
            Command::GateRatio(r) => {
                self.pipeline.lock().gate_mut().set_ratio(r);
                Ok(())
            }
            Command::InputGain(v) => {
                self.params.set_input_gain(v);
                Ok(())
            }
            Command::OutputLevel(v) => {
                self.params.set_output_level(v);
                Ok(())
            }
            Command::LooperMix(v) => {
                self.params.set_looper_mix(v);
                Ok(())
            }
            Command::Looper(action) => {
                let state = self.pipeline.lock().looper().state();
                let cmd = action.resolve(state);
                debug!(command = ?cmd, "looper");
                self.mailbox.post(cmd);
                Ok(())
            }
            Command::Tap => {
                self.press(30);
                Ok(())
            }
            Command::Hold => {
                self.press(HOLD_THRESHOLD_MS);
                Ok(())
            }
            Command::LoadPreset(slot) => {
                let mut p = self.pipeline.lock();
                self.bank
                    .load(slot, &mut p)
                    .map(|_| println!("loaded preset {}: {}", slot, self.bank.name(slot)))
                    .map_err(anyhow::Error::from)
            }
            Command::SavePreset(slot) => self.save_preset(slot),
            Command::ToggleBypass => {
                let bypass = !self.params.bypass();
                self.params.set_bypass(bypass);
                println!("bypass {}", if bypass { "on" } else { "off" });
                Ok(())
            }
            Command::Status => {
                self.print_status();
                Ok(())
            }
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => Ok(()),
        };

        if let Err(e) = result {
            println!("error: {}", e);
        }
    }

    fn save_preset(&mut self, slot: usize) -> anyhow::Result<()> {
        {
            let p = self.pipeline.lock();
            self.bank.save(slot, &p)?;
        }
        if let (Some(store), Some(preset)) = (self.store.as_mut(), self.bank.get(slot)) {
            store.save_slot(slot, preset)?;
        }
        println!("saved preset {}: {}", slot, self.bank.name(slot));
        Ok(())
    }

    fn print_status(&self) {
        let p = self.pipeline.lock();
        let status = p.status();

        println!(
            "level {:6.1} dB  peak {:.3}  gate gain {:.2}  blocks {}",
            status.level_db, status.peak, status.gate_gain, status.blocks_processed
        );
        println!(
            "in {:.2}  out {:.2}  mix {:.2}  bypass {}",
            self.params.input_gain(),
            self.params.output_level(),
            self.params.looper_mix(),
            self.params.bypass()
        );
        println!(
            "looper {} {}%  loop {} samples",
            status.looper_state,
            status.looper_progress,
            p.looper().loop_length()
        );

        let amp = p.amp();
        println!(
            "amp {} gain {:.2} bass {:.2} mid {:.2} treble {:.2} presence {:.2} master {:.2}",
            amp.model().name(),
            amp.gain(),
            amp.bass(),
            amp.mid(),
            amp.treble(),
            amp.presence(),
            amp.master()
        );
        println!(
            "cabinet {} ({})  gate {} {:.0} dB 1:{:.0}",
            p.cabinet().selected_name(),
            if p.cabinet().is_enabled() { "on" } else { "off" },
            if p.gate().is_enabled() { "on" } else { "off" },
            p.gate().threshold_db(),
            p.gate().ratio()
        );

        if p.chain().is_empty() {
            println!("chain empty");
        }
        for (i, inst) in p.chain().instances().enumerate() {
            let ty = inst.effect_type();
            let params: Vec<String> = inst
                .params()
                .iter()
                .enumerate()
                .filter(|(n, _)| param_info(ty, *n).is_used())
                .map(|(n, v)| format!("{}={}", param_info(ty, n).name, format_param_value(ty, n, *v)))
                .collect();
            println!(
                "{} {:<13} {} {}",
                i,
                inst.name(),
                if inst.is_enabled() { "on " } else { "off" },
                params.join(" ")
            );
        }

        if let Some(slot) = self.bank.current_slot() {
            println!("preset {}: {}", slot, self.bank.name(slot));
        }
    }
}
