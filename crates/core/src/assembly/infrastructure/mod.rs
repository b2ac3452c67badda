pub mod ffmpeg_cli_remux_tool;
